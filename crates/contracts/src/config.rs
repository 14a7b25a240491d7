//! Driver configuration contracts
//!
//! Every field has a default so that an empty document is a valid config.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StreamKind;

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Prefix of every frame name (`camera_depth_frame`, `camera_color_optical_frame`, ...)
    #[serde(default = "default_camera_name")]
    pub camera_name: String,

    /// Depth clipping distance in meters (<= 0 disables clipping)
    #[serde(default = "default_clip_distance")]
    pub clip_distance: f32,

    /// Publish depth re-projected into the other streams' viewpoints
    #[serde(default)]
    pub align_depth: bool,

    /// How accel and gyro samples are combined
    #[serde(default)]
    pub unite_imu_method: ImuSyncMethod,

    /// Fixed IMU covariance constants
    #[serde(default)]
    pub imu: ImuCovariance,

    /// Bound of the inertial queue while a frameset is in flight
    #[serde(default = "default_imu_queue_capacity")]
    pub imu_queue_capacity: usize,

    /// Publish stream transforms at all
    #[serde(default = "default_true")]
    pub publish_tf: bool,

    /// Republish rate in Hz (<= 0 publishes once as static)
    #[serde(default)]
    pub tf_publish_rate: f64,

    /// Publish the odom -> pose transform for every pose sample
    #[serde(default = "default_true")]
    pub publish_odom_tf: bool,

    /// Ordered post-processing stages
    #[serde(default = "default_filters")]
    pub filters: Vec<FilterConfig>,

    #[serde(default)]
    pub pointcloud: PointCloudConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Simulated device used when no hardware is attached
    #[serde(default)]
    pub device: DeviceConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            camera_name: default_camera_name(),
            clip_distance: default_clip_distance(),
            align_depth: false,
            unite_imu_method: ImuSyncMethod::default(),
            imu: ImuCovariance::default(),
            imu_queue_capacity: default_imu_queue_capacity(),
            publish_tf: true,
            tf_publish_rate: 0.0,
            publish_odom_tf: true,
            filters: default_filters(),
            pointcloud: PointCloudConfig::default(),
            monitor: MonitorConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Whether the given stage is configured and enabled
    pub fn filter_enabled(&self, tag: StageTag) -> bool {
        self.filters.iter().any(|f| f.name == tag && f.enabled)
    }
}

fn default_camera_name() -> String {
    "camera".to_string()
}

fn default_clip_distance() -> f32 {
    -1.0
}

fn default_imu_queue_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Every known stage in its canonical order, all disabled
fn default_filters() -> Vec<FilterConfig> {
    StageTag::CANONICAL_ORDER
        .iter()
        .map(|&name| FilterConfig {
            name,
            enabled: false,
        })
        .collect()
}

/// IMU synchronisation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImuSyncMethod {
    /// Publish accel and gyro separately
    #[default]
    None,
    /// Pair each gyro sample with the latest accel sample
    Copy,
    /// Interpolate accel at each gyro timestamp
    LinearInterpolation,
}

/// Covariance constants attached to inertial messages
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuCovariance {
    pub linear_accel_cov: f64,
    pub angular_velocity_cov: f64,
}

impl Default for ImuCovariance {
    fn default() -> Self {
        Self {
            linear_accel_cov: 0.01,
            angular_velocity_cov: 0.01,
        }
    }
}

/// Stable identifier of a post-processing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageTag {
    Decimation,
    DisparityStart,
    Spatial,
    Temporal,
    HoleFilling,
    DisparityEnd,
    Colorizer,
    Pointcloud,
}

impl StageTag {
    pub const CANONICAL_ORDER: [StageTag; 8] = [
        StageTag::Decimation,
        StageTag::DisparityStart,
        StageTag::Spatial,
        StageTag::Temporal,
        StageTag::HoleFilling,
        StageTag::DisparityEnd,
        StageTag::Colorizer,
        StageTag::Pointcloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decimation => "decimation",
            Self::DisparityStart => "disparity_start",
            Self::Spatial => "spatial",
            Self::Temporal => "temporal",
            Self::HoleFilling => "hole_filling",
            Self::DisparityEnd => "disparity_end",
            Self::Colorizer => "colorizer",
            Self::Pointcloud => "pointcloud",
        }
    }
}

impl fmt::Display for StageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the ordered filter list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub name: StageTag,
    #[serde(default)]
    pub enabled: bool,
}

/// Point cloud texture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudConfig {
    /// Stream whose pixels color the cloud
    #[serde(default = "default_texture_stream")]
    pub texture_stream: StreamKind,

    #[serde(default)]
    pub texture_index: u8,

    /// Keep points that fall outside the texture image
    #[serde(default)]
    pub allow_no_texture_points: bool,
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self {
            texture_stream: default_texture_stream(),
            texture_index: 0,
            allow_no_texture_points: false,
        }
    }
}

fn default_texture_stream() -> StreamKind {
    StreamKind::Color
}

/// Temperature monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_monitor_interval_ms")]
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_monitor_interval_ms(),
        }
    }
}

fn default_monitor_interval_ms() -> u64 {
    10_000
}

/// Simulated device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_accel_hz")]
    pub accel_hz: u32,

    #[serde(default = "default_gyro_hz")]
    pub gyro_hz: u32,

    /// Meters per depth unit
    #[serde(default = "default_depth_scale")]
    pub depth_scale: f32,

    #[serde(default = "default_true")]
    pub enable_infrared: bool,

    #[serde(default)]
    pub enable_pose: bool,

    /// Timestamps in the host domain (no frame metadata)
    #[serde(default)]
    pub system_time_domain: bool,

    #[serde(default)]
    pub seed: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            accel_hz: default_accel_hz(),
            gyro_hz: default_gyro_hz(),
            depth_scale: default_depth_scale(),
            enable_infrared: true,
            enable_pose: false,
            system_time_domain: false,
            seed: 0,
        }
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    30
}

fn default_accel_hz() -> u32 {
    63
}

fn default_gyro_hz() -> u32 {
    200
}

fn default_depth_scale() -> f32 {
    0.001
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: DriverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.camera_name, "camera");
        assert_eq!(config.imu_queue_capacity, 1000);
        assert_eq!(config.unite_imu_method, ImuSyncMethod::None);
        assert_eq!(config.filters.len(), StageTag::CANONICAL_ORDER.len());
        assert!(config.filters.iter().all(|f| !f.enabled));
        assert!(config.clip_distance < 0.0);
    }

    #[test]
    fn test_filter_enabled() {
        let config: DriverConfig = serde_json::from_str(
            r#"{"filters": [{"name": "colorizer", "enabled": true}, {"name": "pointcloud"}]}"#,
        )
        .unwrap();
        assert!(config.filter_enabled(StageTag::Colorizer));
        assert!(!config.filter_enabled(StageTag::Pointcloud));
        assert!(!config.filter_enabled(StageTag::Decimation));
    }

    #[test]
    fn test_imu_method_names() {
        let method: ImuSyncMethod = serde_json::from_str("\"linear_interpolation\"").unwrap();
        assert_eq!(method, ImuSyncMethod::LinearInterpolation);
    }
}
