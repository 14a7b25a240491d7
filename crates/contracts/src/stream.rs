//! Stream identity and profile model
//!
//! Describes what the device reports about each logical stream: kind, index,
//! pixel format, resolution and optical calibration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Pose,
    Confidence,
}

impl StreamKind {
    /// Short name used in channel and frame identifiers
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Color => "color",
            Self::Infrared => "infra",
            Self::Fisheye => "fisheye",
            Self::Gyro => "gyro",
            Self::Accel => "accel",
            Self::Pose => "pose",
            Self::Confidence => "confidence",
        }
    }

    /// Motion streams carry inertial samples instead of images
    pub fn is_motion(&self) -> bool {
        matches!(self, Self::Gyro | Self::Accel)
    }

    pub fn is_video(&self) -> bool {
        !self.is_motion() && *self != Self::Pose
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (stream kind, index) pair identifying a logical channel
///
/// At most one active profile exists per key in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub kind: StreamKind,
    pub index: u8,
}

impl StreamKey {
    pub const fn new(kind: StreamKind, index: u8) -> Self {
        Self { kind, index }
    }

    /// Stream name as used in topic and frame names (`depth`, `infra1`, `color`)
    pub fn name(&self) -> String {
        if self.index == 0 {
            self.kind.as_str().to_string()
        } else {
            format!("{}{}", self.kind.as_str(), self.index)
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// 像素/样本格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 16-bit depth units
    Z16,
    Y8,
    Rgb8,
    Bgr8,
    Rgba8,
    /// Three little-endian f32 values per motion sample
    MotionXyz32f,
    /// Packed pose record
    SixDof,
    /// Vertices of a point cloud
    Xyz32f,
}

impl PixelFormat {
    /// Bytes per pixel for video formats, `None` for non-image payloads
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            Self::Y8 => Some(1),
            Self::Z16 => Some(2),
            Self::Rgb8 | Self::Bgr8 => Some(3),
            Self::Rgba8 => Some(4),
            Self::MotionXyz32f | Self::SixDof | Self::Xyz32f => None,
        }
    }
}

/// Lens distortion model reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    #[default]
    None,
    BrownConrady,
    ModifiedBrownConrady,
    InverseBrownConrady,
    KannalaBrandt4,
    Ftheta,
}

/// Optical intrinsics of a video stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f32,
    pub fy: f32,
    pub ppx: f32,
    pub ppy: f32,
    pub model: DistortionModel,
    pub coeffs: [f32; 5],
}

/// Rigid transform between two stream profiles
///
/// `rotation` is stored column-major, as the device reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    pub rotation: [f32; 9],
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub const IDENTITY_ROTATION: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    /// Identity rotation, zero translation
    pub fn identity() -> Self {
        Self {
            rotation: Self::IDENTITY_ROTATION,
            translation: [0.0; 3],
        }
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

/// Motion-module intrinsics (scale/bias matrix and variances)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionIntrinsics {
    pub data: [[f32; 4]; 3],
    pub noise_variances: [f32; 3],
    pub bias_variances: [f32; 3],
}

impl Default for MotionIntrinsics {
    /// Identity-like scale, zero bias and zero variances
    fn default() -> Self {
        Self {
            data: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            noise_variances: [0.0; 3],
            bias_variances: [0.0; 3],
        }
    }
}

/// Stream profile as enumerated from the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub key: StreamKey,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Present for video streams only
    pub intrinsics: Option<Intrinsics>,
}

impl StreamProfile {
    pub fn kind(&self) -> StreamKind {
        self.key.kind
    }

    pub fn index(&self) -> u8 {
        self.key.index
    }

    pub fn is_video(&self) -> bool {
        self.key.kind.is_video() && self.format.bytes_per_pixel().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_key_name() {
        assert_eq!(StreamKey::new(StreamKind::Depth, 0).name(), "depth");
        assert_eq!(StreamKey::new(StreamKind::Infrared, 1).name(), "infra1");
        assert_eq!(StreamKey::new(StreamKind::Infrared, 2).to_string(), "infra2");
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(PixelFormat::Z16.bytes_per_pixel(), Some(2));
        assert_eq!(PixelFormat::Rgb8.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::MotionXyz32f.bytes_per_pixel(), None);
    }

    #[test]
    fn test_stream_kind_serde() {
        let json = serde_json::to_string(&StreamKind::Infrared).unwrap();
        assert_eq!(json, "\"infrared\"");
        let kind: StreamKind = serde_json::from_str("\"color\"").unwrap();
        assert_eq!(kind, StreamKind::Color);
    }
}
