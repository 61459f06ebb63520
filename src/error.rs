//! # Error Types
//!
//! Custom error types for the GSat codec using `thiserror`.
//!
//! Every error knows which protocol [`Layer`] raised it, so a caller can tell a
//! forged command (authentication) from transport corruption (encryption) from
//! a firmware mismatch (framing).

use std::fmt;
use thiserror::Error;

/// Protocol layer that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Message type bytes, command framing, protocol version gates
    Framing,
    /// HMAC-SHA-256-80 wrap and verify
    Authentication,
    /// AES-CCM envelope
    Encryption,
    /// Position, settings and text payload decoding
    Codec,
    /// Configuration and key material
    Config,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Framing => "framing",
            Layer::Authentication => "authentication",
            Layer::Encryption => "encryption",
            Layer::Codec => "codec",
            Layer::Config => "config",
        };
        f.write_str(name)
    }
}

/// Main error type for the GSat codec
#[derive(Debug, Error)]
pub enum GsatError {
    /// Buffer shorter than the layout requires
    #[error("{layer} error: buffer too short: {actual} bytes (minimum {minimum})")]
    TooShort {
        layer: Layer,
        actual: usize,
        minimum: usize,
    },

    /// Encoded data larger than the firmware accepts
    #[error("{layer} error: payload too large: {size} bytes (max {max})")]
    TooLarge { layer: Layer, size: usize, max: usize },

    /// Bit field outside the buffer
    #[error("codec error: bit field {offset}+{width} out of range for {available}-bit buffer")]
    OutOfRange {
        offset: usize,
        width: u32,
        available: usize,
    },

    /// Envelope marker byte missing or wrong
    #[error("{layer} error: expected marker 0x{expected:02X}, found {found:?}")]
    MissingMarker {
        layer: Layer,
        expected: u8,
        found: Option<u8>,
    },

    /// HMAC did not match
    #[error("authentication error: HMAC invalid for message")]
    AuthenticationFailed,

    /// AEAD encryption rejected the input
    #[error("encryption error: {0}")]
    EncryptionFailed(String),

    /// AEAD tag mismatch or malformed ciphertext
    #[error("encryption error: decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encrypted message arrived without a configured key
    #[error("encryption error: an encryption key is required to decrypt this message")]
    EncryptionKeyRequired,

    /// Legacy proprietary report format
    #[error("framing error: unsupported message format 0x{0:02X}")]
    UnsupportedFormat(u8),

    /// Type byte not defined by the protocol
    #[error("framing error: unknown message type {0}")]
    UnknownMessageType(u8),

    /// Operation has no equivalent at this protocol version
    #[error("framing error: {operation} is not supported by protocol version {version}")]
    UnsupportedVersion {
        operation: &'static str,
        version: u8,
    },

    /// Key material could not be parsed
    #[error("config error: invalid key: {0}")]
    InvalidKey(String),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("config error: I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl GsatError {
    /// Layer that raised this error
    pub fn layer(&self) -> Layer {
        match self {
            GsatError::TooShort { layer, .. }
            | GsatError::TooLarge { layer, .. }
            | GsatError::MissingMarker { layer, .. } => *layer,
            GsatError::OutOfRange { .. } => Layer::Codec,
            GsatError::AuthenticationFailed => Layer::Authentication,
            GsatError::EncryptionFailed(_)
            | GsatError::DecryptionFailed(_)
            | GsatError::EncryptionKeyRequired => Layer::Encryption,
            GsatError::UnsupportedFormat(_)
            | GsatError::UnknownMessageType(_)
            | GsatError::UnsupportedVersion { .. } => Layer::Framing,
            GsatError::InvalidKey(_) | GsatError::Config(_) | GsatError::Io(_) => Layer::Config,
        }
    }

    pub(crate) fn too_short(layer: Layer, actual: usize, minimum: usize) -> Self {
        GsatError::TooShort {
            layer,
            actual,
            minimum,
        }
    }
}

/// Result type alias for the GSat codec
pub type Result<T> = std::result::Result<T, GsatError>;
