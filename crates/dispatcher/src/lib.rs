//! # Dispatcher
//!
//! 帧分发模块。
//!
//! 负责：
//! - 设备回调入口：frameset / 单帧 / IMU / pose 分类
//! - 深度裁剪、后处理管线、对齐深度
//! - frameset 处理期间暂停合并 IMU 通道
//! - 节点装配：标定、静态变换、温度监控

pub mod bus;
pub mod clip;
mod dispatcher;
mod error;
mod imu;
pub mod metrics;
mod monitor;
mod node;
pub mod pipeline;
mod pose;
mod publish;

#[cfg(test)]
mod testing;

pub use bus::{LogBus, RecordingBus};
pub use clip::{clip_depth, fix_depth_scale};
pub use dispatcher::{dedup_indices, FrameDispatcher, SYNCED_IMU_SINK};
pub use error::{DispatcherError, DispatcherResult};
pub use imu::ImuRouter;
pub use metrics::{DispatchMetrics, DispatchSnapshot};
pub use monitor::{read_temperatures, spawn_temperature_monitor};
pub use node::DriverNode;
pub use pipeline::{FilterPipeline, NamedFilter, PointCloudFilter, Stage};
pub use pose::{pose_covariance, PoseRouter};
pub use publish::{encoding_for, ImagePublisher};
