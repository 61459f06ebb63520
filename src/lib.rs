//! # GSat Codec Library
//!
//! Wire codec for GSatMicro Iridium satellite trackers.
//!
//! This library encodes operator commands (authenticated and optionally
//! encrypted) and decodes the position reports, settings dumps and text
//! messages the device sends back. It does no I/O beyond loading a
//! configuration file; transport and message counters belong to the caller.

pub mod config;
pub mod error;
pub mod gsat;

pub use config::Config;
pub use error::{GsatError, Layer, Result};
