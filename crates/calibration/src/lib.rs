//! # Calibration
//!
//! Per-stream camera models derived from device-reported profiles.
//!
//! - `CalibrationRegistry`: intrinsic records keyed by stream, stereo
//!   extrinsics, lazy refresh on resolution change
//! - `imu_info` / `extrinsics_message`: one-shot calibration messages

mod error;
mod motion;
mod record;
mod registry;

pub use error::{CalibrationError, CalibrationResult};
pub use motion::{extrinsics_message, imu_info};
pub use record::{CalibrationRecord, EQUIDISTANT, IDENTITY_3X3, PLUMB_BOB};
pub use registry::CalibrationRegistry;
