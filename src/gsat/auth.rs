//! # Command Authentication
//!
//! Operator commands for protocol version 2 and later are wrapped with a
//! truncated HMAC so the device can reject forged commands:
//!
//! ```text
//! [0x00, command..., HMAC-SHA-256(key, command)[0..10]]
//! ```
//!
//! The HMAC covers the command bytes only, not the leading marker. Device
//! reports are never wrapped this way.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use super::protocol::{ProtocolVersion, AUTH_MARKER, HMAC_LEN, WRAP_OVERHEAD};
use crate::error::{GsatError, Layer, Result};

type HmacSha256 = Hmac<Sha256>;

/// Shared HMAC secret (the device password)
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey(Vec<u8>);

impl AuthKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a standard base64 key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        data_encoding::BASE64
            .decode(encoded.trim().as_bytes())
            .map(Self)
            .map_err(|e| GsatError::InvalidKey(format!("auth key is not valid base64: {}", e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

fn keyed_mac(key: &AuthKey) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| GsatError::InvalidKey(format!("auth key rejected: {}", e)))
}

/// Compute HMAC-SHA-256-80 over `command`
pub fn compute_hmac(command: &[u8], key: &AuthKey) -> Result<[u8; HMAC_LEN]> {
    let mut mac = keyed_mac(key)?;
    mac.update(command);
    let digest = mac.finalize().into_bytes();

    let mut truncated = [0u8; HMAC_LEN];
    truncated.copy_from_slice(&digest[..HMAC_LEN]);
    Ok(truncated)
}

/// Wrap a command with the authentication marker and HMAC
///
/// Protocol versions below 2 have no envelope and get the command unchanged.
pub fn wrap_command(command: &[u8], key: &AuthKey, version: ProtocolVersion) -> Result<Vec<u8>> {
    if !version.is_binary() {
        return Ok(command.to_vec());
    }

    let hmac = compute_hmac(command, key)?;

    let mut wrapped = Vec::with_capacity(command.len() + WRAP_OVERHEAD);
    wrapped.push(AUTH_MARKER);
    wrapped.extend_from_slice(command);
    wrapped.extend_from_slice(&hmac);

    debug!("Wrapped {} byte command ({} bytes)", command.len(), wrapped.len());
    Ok(wrapped)
}

/// Check the trailing HMAC of `[command..., hmac(10)]` and return the command
///
/// # Errors
///
/// Returns `AuthenticationFailed` if the HMAC does not match, or `TooShort`
/// if there is no room for one.
pub fn verify_hmac<'a>(authenticated: &'a [u8], key: &AuthKey) -> Result<&'a [u8]> {
    if authenticated.len() < HMAC_LEN {
        return Err(GsatError::too_short(Layer::Authentication, authenticated.len(), HMAC_LEN));
    }

    let (command, tag) = authenticated.split_at(authenticated.len() - HMAC_LEN);
    let mut mac = keyed_mac(key)?;
    mac.update(command);
    mac.verify_truncated_left(tag).map_err(|_| {
        warn!("HMAC invalid for {} byte command", command.len());
        GsatError::AuthenticationFailed
    })?;

    Ok(command)
}

/// Verify a wrapped command and return the bare command bytes
///
/// Protocol versions below 2 are passed through unchanged.
///
/// # Errors
///
/// Returns error if:
/// - The buffer cannot hold the marker and HMAC (`TooShort`)
/// - The leading marker is not `0x00` (`MissingMarker`)
/// - The HMAC does not match (`AuthenticationFailed`)
pub fn verify_command(wrapped: &[u8], key: &AuthKey, version: ProtocolVersion) -> Result<Vec<u8>> {
    if !version.is_binary() {
        return Ok(wrapped.to_vec());
    }

    if wrapped.len() < WRAP_OVERHEAD {
        return Err(GsatError::too_short(Layer::Authentication, wrapped.len(), WRAP_OVERHEAD));
    }
    if wrapped[0] != AUTH_MARKER {
        return Err(GsatError::MissingMarker {
            layer: Layer::Authentication,
            expected: AUTH_MARKER,
            found: Some(wrapped[0]),
        });
    }

    verify_hmac(&wrapped[1..], key).map(<[u8]>::to_vec)
}
