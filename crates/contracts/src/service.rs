//! Collaborator traits
//!
//! The bridge never talks to a concrete SDK or transport. Everything it needs
//! from the outside goes through these traits:
//!
//! - [`DeviceService`]: profiles, extrinsics, motion intrinsics, options and
//!   processing blocks
//! - [`SampleSource`]: callback delivery of samples
//! - [`MessageBus`]: publish + subscriber-count query
//! - [`Clock`]: "now" in bus time

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    ContractError, Extrinsics, Frameset, Message, Channel, MotionIntrinsics, Sample, Stamp,
    StageTag, StreamKind, StreamProfile,
};

/// Publish/subscribe transport
pub trait MessageBus: Send + Sync {
    /// Publish one message on a channel
    fn publish(&self, channel: &Channel, message: Message) -> Result<(), ContractError>;

    /// Current number of subscribers of a channel
    fn subscriber_count(&self, channel: &Channel) -> usize;

    /// Whether anyone listens on the channel
    fn has_subscribers(&self, channel: &Channel) -> bool {
        self.subscriber_count(channel) > 0
    }
}

/// Bus-native clock
pub trait Clock: Send + Sync {
    fn now(&self) -> Stamp;
}

/// Wall clock backed by `chrono`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Stamp {
        let now = chrono::Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
        Stamp::from_nanos(nanos)
    }
}

/// A processing block that consumes and returns a frameset
pub trait FrameFilter: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, frameset: Frameset) -> Result<Frameset, ContractError>;
}

/// Readable device options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOption {
    AsicTemperature,
    ProjectorTemperature,
}

impl DeviceOption {
    pub const TEMPERATURES: [DeviceOption; 2] =
        [DeviceOption::AsicTemperature, DeviceOption::ProjectorTemperature];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AsicTemperature => "asic_temperature",
            Self::ProjectorTemperature => "projector_temperature",
        }
    }
}

impl fmt::Display for DeviceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device/profile service
pub trait DeviceService: Send + Sync {
    /// Human-readable device name
    fn name(&self) -> &str;

    /// Active stream profiles
    fn stream_profiles(&self) -> Vec<StreamProfile>;

    /// Extrinsics mapping points of `from` into `to`
    ///
    /// Returns [`ContractError::ExtrinsicsUnavailable`] when the device knows
    /// no relation between the two.
    fn extrinsics(
        &self,
        from: &StreamProfile,
        to: &StreamProfile,
    ) -> Result<Extrinsics, ContractError>;

    /// Motion-module intrinsics of an accel/gyro profile
    fn motion_intrinsics(&self, profile: &StreamProfile)
        -> Result<MotionIntrinsics, ContractError>;

    /// Meters per depth unit
    fn depth_scale(&self) -> f32;

    fn option_value(&self, option: DeviceOption) -> Result<f32, ContractError>;

    /// Processing block implementing a named pipeline stage
    fn processing_block(&self, tag: StageTag) -> Option<Arc<dyn FrameFilter>>;

    /// Block re-projecting depth into the viewpoint of `target`
    fn align_to(&self, target: StreamKind) -> Arc<dyn FrameFilter>;
}

/// Sample callback type
pub type SampleCallback = Arc<dyn Fn(Sample) + Send + Sync>;

/// Callback-driven sample delivery
///
/// `start` is idempotent: a second call while streaming does nothing.
pub trait SampleSource: Send + Sync {
    fn start(&self, callback: SampleCallback);

    fn stop(&self);

    fn is_streaming(&self) -> bool;
}
