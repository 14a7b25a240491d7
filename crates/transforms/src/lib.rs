//! # Transforms
//!
//! 坐标系变换。
//!
//! 负责：
//! - 选择几何根流 (depth 优先，其次 pose)
//! - 计算每个流到 base / optical / aligned-depth 帧的静态变换
//! - 按配置速率周期性重发，或一次性发布到 static 通道
//! - 设备坐标轴到总线坐标轴的转换

pub mod axes;
mod error;
mod frames;
mod publisher;

pub use error::{TransformError, TransformResult};
pub use frames::FrameNames;
pub use publisher::{select_base_profile, TransformPublisher};
