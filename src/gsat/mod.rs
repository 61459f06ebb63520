//! # GSatMicro Protocol Module
//!
//! Implementation of the GSatMicro two-way messaging protocol.
//!
//! This module handles:
//! - Bit-exact decoding of the 10-byte and 18-byte position reports
//! - Versioned settings dumps and single-setting update commands
//! - Operator command framing (text, raw command, settings/version requests)
//! - HMAC-SHA-256-80 authentication of operator commands
//! - AES-CCM encryption envelopes for both directions
//! - Routing device reports by their leading type byte

pub mod protocol;
pub mod bits;
pub mod position;
pub mod settings;
pub mod text;
pub mod command;
pub mod auth;
pub mod envelope;
pub mod dispatch;
