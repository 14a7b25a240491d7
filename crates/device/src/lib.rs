//! # Device
//!
//! 模拟深度相机。
//!
//! 负责：
//! - 实现 `DeviceService`：流配置、内外参、温度选项
//! - 参考处理块：降采样、着色、点云、对齐
//! - 实现 `SampleSource`：后台线程按帧率推送 frameset 与 IMU/pose 样本

pub mod blocks;
mod device;
mod error;
pub mod geometry;
mod scene;
mod source;

pub use device::{SimulatedDevice, DECIMATION_FACTOR, POSE_RATE_HZ, STEREO_BASELINE};
pub use error::{DeviceError, DeviceResult};
pub use scene::Scene;
pub use source::{SimulatedSource, DEVICE_CLOCK_START_MS};
