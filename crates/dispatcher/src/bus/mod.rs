//! Bus implementations
//!
//! Contains LogBus and RecordingBus.

mod log;
mod recording;

pub use self::log::LogBus;
pub use self::recording::RecordingBus;
