//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Device timestamps are milliseconds (f64) in the device clock
//! - Bus time is [`Stamp`] (nanoseconds since the Unix epoch)
//! - The mapping between the two is established once per session

mod config;
mod error;
mod frame;
mod message;
mod service;
mod stream;

pub use config::*;
pub use error::*;
pub use frame::*;
pub use message::*;
pub use service::*;
pub use stream::*;
