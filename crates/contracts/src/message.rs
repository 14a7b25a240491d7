//! Outgoing bus messages and channel identifiers

use std::fmt;
use std::ops::Add;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{StreamKey, StreamKind};

/// Bus time in nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub nanos: i64,
}

impl Stamp {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self {
            nanos: (secs * 1e9).round() as i64,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1e9
    }

    /// Offset by a (possibly negative) number of nanoseconds
    pub fn offset_nanos(&self, nanos: f64) -> Self {
        Self {
            nanos: self.nanos + nanos.round() as i64,
        }
    }
}

impl Add<Duration> for Stamp {
    type Output = Stamp;

    fn add(self, rhs: Duration) -> Stamp {
        Stamp::from_nanos(self.nanos + rhs.as_nanos() as i64)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}", self.as_secs_f64())
    }
}

/// 3D 向量
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 四元数 (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// All-zero quaternion, used to mark orientation as unavailable
    pub const ZERO: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 0.0,
    };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Common message header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Stamp, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub is_bigendian: bool,
    pub step: u32,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub distortion_model: String,
    pub d: Vec<f64>,
    pub k: [f64; 9],
    pub r: [f64; 9],
    pub p: [f64; 12],
}

/// Inertial message; orientation is never estimated here
#[derive(Debug, Clone, PartialEq)]
pub struct ImuMessage {
    pub header: Header,
    pub orientation: Quaternion,
    pub orientation_covariance: [f64; 9],
    pub angular_velocity: Vector3,
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration: Vector3,
    pub linear_acceleration_covariance: [f64; 9],
}

/// Transform between two named frames
#[derive(Debug, Clone, PartialEq)]
pub struct StaticTransform {
    pub stamp: Stamp,
    pub translation: Vector3,
    pub rotation: Quaternion,
    pub parent_frame: String,
    pub child_frame: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Odometry {
    pub header: Header,
    pub child_frame_id: String,
    pub pose: Pose,
    /// Row-major 6x6
    pub pose_covariance: [f64; 36],
    pub twist: Twist,
    /// Row-major 6x6
    pub twist_covariance: [f64; 36],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudMessage {
    pub header: Header,
    pub points: Vec<[f32; 3]>,
    /// Per-point RGB, same length as `points` when textured
    pub colors: Option<Vec<[u8; 3]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImuInfo {
    pub header: Header,
    pub data: [f64; 12],
    pub noise_variances: [f64; 3],
    pub bias_variances: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicsMessage {
    pub header: Header,
    pub rotation: [f64; 9],
    pub translation: [f64; 3],
}

/// Any message the bridge publishes
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Image(ImageMessage),
    CameraInfo(CameraInfo),
    Imu(ImuMessage),
    Odometry(Odometry),
    Transforms(Vec<StaticTransform>),
    PointCloud(PointCloudMessage),
    ImuInfo(ImuInfo),
    Extrinsics(ExtrinsicsMessage),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::CameraInfo(_) => "camera_info",
            Self::Imu(_) => "imu",
            Self::Odometry(_) => "odometry",
            Self::Transforms(_) => "transforms",
            Self::PointCloud(_) => "point_cloud",
            Self::ImuInfo(_) => "imu_info",
            Self::Extrinsics(_) => "extrinsics",
        }
    }
}

/// Output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Image(StreamKey),
    CameraInfo(StreamKey),
    /// Depth re-projected into the given stream's viewpoint
    AlignedDepthImage(StreamKey),
    AlignedDepthInfo(StreamKey),
    /// Unsynchronised per-stream inertial messages
    Imu(StreamKey),
    /// Combined accel + gyro messages
    SyncedImu,
    Odometry,
    PointCloud,
    Tf,
    TfStatic,
    ImuInfo(StreamKey),
    /// Extrinsics from depth to the given stream
    Extrinsics(StreamKey),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(key) => write!(f, "{key}/image_raw"),
            Self::CameraInfo(key) => write!(f, "{key}/camera_info"),
            Self::AlignedDepthImage(key) => write!(f, "aligned_depth_to_{key}/image_raw"),
            Self::AlignedDepthInfo(key) => write!(f, "aligned_depth_to_{key}/camera_info"),
            Self::Imu(key) => write!(f, "{key}/sample"),
            Self::SyncedImu => f.write_str("imu"),
            Self::Odometry => f.write_str("odom/sample"),
            Self::PointCloud => f.write_str("depth/color/points"),
            Self::Tf => f.write_str("/tf"),
            Self::TfStatic => f.write_str("/tf_static"),
            Self::ImuInfo(key) => write!(f, "{key}/imu_info"),
            Self::Extrinsics(key) => write!(
                f,
                "extrinsics/{}_to_{key}",
                StreamKind::Depth.as_str()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        let color = StreamKey::new(StreamKind::Color, 0);
        let infra1 = StreamKey::new(StreamKind::Infrared, 1);
        assert_eq!(Channel::Image(color).to_string(), "color/image_raw");
        assert_eq!(Channel::CameraInfo(infra1).to_string(), "infra1/camera_info");
        assert_eq!(
            Channel::AlignedDepthImage(color).to_string(),
            "aligned_depth_to_color/image_raw"
        );
        assert_eq!(Channel::Extrinsics(color).to_string(), "extrinsics/depth_to_color");
    }

    #[test]
    fn test_stamp_offset() {
        let stamp = Stamp::from_nanos(1_000_000_000);
        assert_eq!(stamp.offset_nanos(2.5e6).nanos, 1_002_500_000);
        assert_eq!(stamp.offset_nanos(-1e9).nanos, 0);
        assert!((Stamp::from_secs_f64(1.5).as_secs_f64() - 1.5).abs() < 1e-12);
    }
}
