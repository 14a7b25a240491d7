//! Bridge session orchestration.

mod session;
mod stats;

pub use session::{BridgeSession, SessionConfig};
pub use stats::BridgeStats;
