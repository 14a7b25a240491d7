//! # Sync Engine
//!
//! 时间同步与 IMU 融合。
//!
//! 负责：
//! - 会话时钟基准 (`ClockBase`)：设备时间 -> 总线时间
//! - 加速度计/陀螺仪融合 (`ImuSynchronizer`)：copy / linear interpolation
//! - IMU 发布闸门 (`PausableSink`)：frameset 处理期间暂停并排队
//!
//! ## 使用示例
//!
//! ```ignore
//! use sync_engine::{ImuSynchronizer, InertialSample, ImuAxis};
//!
//! let mut sync = ImuSynchronizer::for_method(ImuSyncMethod::Copy).unwrap();
//! for unified in sync.ingest(InertialSample::new(ImuAxis::Gyro, reading, t_ns)) {
//!     sink.publish(unified.into_message(stamp, frame_id, &covariance))?;
//! }
//! ```

mod clock;
mod error;
mod imu;
mod sink;

pub use clock::ClockBase;
pub use error::{SyncError, SyncResult};
pub use imu::{
    empty_imu_message, CopyLatest, ImuAxis, ImuSynchronizer, InertialSample, LinearInterpolation,
    UnifiedInertial,
};
pub use sink::{PausableSink, PauseGuard, Publisher};

// Re-export contracts types
pub use contracts::{ImuCovariance, ImuMessage, ImuSyncMethod};
