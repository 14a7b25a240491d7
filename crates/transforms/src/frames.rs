//! Coordinate frame naming

use contracts::StreamKey;

/// Frame names derived from the camera name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNames {
    camera: String,
}

impl FrameNames {
    pub fn new(camera: impl Into<String>) -> Self {
        Self {
            camera: camera.into(),
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn frame_id(&self, key: StreamKey) -> String {
        format!("{}_{}_frame", self.camera, key.name())
    }

    pub fn optical_frame_id(&self, key: StreamKey) -> String {
        format!("{}_{}_optical_frame", self.camera, key.name())
    }

    /// Virtual frame of depth aligned to `key`
    pub fn aligned_depth_frame_id(&self, key: StreamKey) -> String {
        format!("{}_aligned_depth_to_{}_frame", self.camera, key.name())
    }

    /// Frame of combined accel + gyro messages
    pub fn imu_optical_frame_id(&self) -> String {
        format!("{}_imu_optical_frame", self.camera)
    }

    pub fn odom_frame(&self) -> String {
        "odom_frame".to_string()
    }
}

impl Default for FrameNames {
    fn default() -> Self {
        Self::new("camera")
    }
}
