//! # Encryption Envelope
//!
//! AES-CCM envelope with a 64-bit tag, a 7-byte nonce and no associated data.
//!
//! ## Operator to device
//!
//! The leading `0x00` of an authenticated command is replaced by the
//! encrypted form of everything after it:
//!
//! ```text
//! [0x00, 0xFF, nonce(7), ciphertext..., tag(8)]
//! ```
//!
//! ## Device to operator
//!
//! Reports arrive as `[0xFF, nonce(7), ciphertext..., tag(8)]` and carry no
//! HMAC; the tag alone authenticates them.
//!
//! The nonce is the decimal message counter as ASCII, zero-padded to seven
//! digits. Counters above 9 999 999 keep only the last seven digits, so the
//! caller must never reuse a counter under the same key.

use std::fmt;

use aes::{Aes128, Aes256};
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{Aead, KeyInit};
use ccm::consts::{U7, U8};
use ccm::Ccm;
use tracing::{debug, trace, warn};

use super::auth::{verify_command, wrap_command, AuthKey};
use super::protocol::*;
use crate::error::{GsatError, Layer, Result};

type Aes128Ccm = Ccm<Aes128, U8, U7>;
type Aes256Ccm = Ccm<Aes256, U8, U7>;

/// Smallest device report envelope: marker + nonce + tag
const MIN_REPORT_ENVELOPE: usize = 1 + NONCE_LEN + TAG_LEN;

/// AES key shared with the device
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionKey {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

impl EncryptionKey {
    /// Build a key from 16 or 32 raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Ok(key) = <[u8; 16]>::try_from(bytes) {
            return Ok(EncryptionKey::Aes128(key));
        }
        if let Ok(key) = <[u8; 32]>::try_from(bytes) {
            return Ok(EncryptionKey::Aes256(key));
        }
        Err(GsatError::InvalidKey(format!(
            "encryption key must be 16 or 32 bytes, got {}",
            bytes.len()
        )))
    }

    /// Parse a hex key (32 or 64 hex digits)
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| GsatError::InvalidKey(format!("encryption key is not valid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Key length in bits
    pub fn bits(&self) -> usize {
        match self {
            EncryptionKey::Aes128(_) => 128,
            EncryptionKey::Aes256(_) => 256,
        }
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        let sealed = match self {
            EncryptionKey::Aes128(key) => Aes128Ccm::new(GenericArray::from_slice(key)).encrypt(nonce, plaintext),
            EncryptionKey::Aes256(key) => Aes256Ccm::new(GenericArray::from_slice(key)).encrypt(nonce, plaintext),
        };
        sealed.map_err(|e| GsatError::EncryptionFailed(e.to_string()))
    }

    fn open(&self, nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        let opened = match self {
            EncryptionKey::Aes128(key) => Aes128Ccm::new(GenericArray::from_slice(key)).decrypt(nonce, sealed),
            EncryptionKey::Aes256(key) => Aes256Ccm::new(GenericArray::from_slice(key)).decrypt(nonce, sealed),
        };
        opened.map_err(|_| {
            warn!("AES-CCM tag mismatch on {} byte ciphertext", sealed.len());
            GsatError::DecryptionFailed("authentication tag mismatch".to_string())
        })
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

/// Key material for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub auth_key: AuthKey,
    pub encryption_key: Option<EncryptionKey>,
}

impl Credentials {
    pub fn new(auth_key: AuthKey, encryption_key: Option<EncryptionKey>) -> Self {
        Self {
            auth_key,
            encryption_key,
        }
    }
}

/// Nonce for message `counter`: last seven digits, zero-padded, as ASCII
///
/// # Examples
///
/// ```
/// use gsat_codec::gsat::envelope::message_nonce;
///
/// assert_eq!(&message_nonce(42), b"0000042");
/// assert_eq!(&message_nonce(12_345_678), b"2345678");
/// ```
pub fn message_nonce(counter: u64) -> [u8; NONCE_LEN] {
    let digits = format!("{:07}", counter);
    let digits = digits.as_bytes();

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digits[digits.len() - NONCE_LEN..]);
    nonce
}

/// Encrypt an authenticated command
///
/// # Arguments
///
/// * `wrapped` - Output of [`wrap_command`], starting with `0x00`
/// * `key` - Device encryption key
/// * `counter` - Message counter, unique per key
///
/// # Returns
///
/// * `Result<Vec<u8>>` - `[0x00, 0xFF, nonce(7), ciphertext..., tag(8)]`
///
/// # Errors
///
/// Returns error if:
/// - `wrapped` does not start with the authentication marker (`MissingMarker`)
/// - The result would exceed the 255-byte firmware limit (`TooLarge`)
pub fn encrypt_command(wrapped: &[u8], key: &EncryptionKey, counter: u64) -> Result<Vec<u8>> {
    let plaintext = match wrapped.split_first() {
        Some((&AUTH_MARKER, rest)) => rest,
        other => {
            return Err(GsatError::MissingMarker {
                layer: Layer::Encryption,
                expected: AUTH_MARKER,
                found: other.map(|(&b, _)| b),
            })
        }
    };

    let size = wrapped.len() + ENCRYPTION_OVERHEAD;
    if size > FIRMWARE_PAYLOAD_LIMIT {
        return Err(GsatError::TooLarge {
            layer: Layer::Encryption,
            size,
            max: FIRMWARE_PAYLOAD_LIMIT,
        });
    }

    let nonce = message_nonce(counter);
    let sealed = key.seal(&nonce, plaintext)?;

    let mut msg = Vec::with_capacity(size);
    msg.push(AUTH_MARKER);
    msg.push(ENCRYPTION_MARKER);
    msg.extend_from_slice(&nonce);
    msg.extend_from_slice(&sealed);

    debug!(
        "Encrypted {} byte command with AES-{} (counter {})",
        wrapped.len(),
        key.bits(),
        counter
    );
    Ok(msg)
}

/// Decrypt an operator command back to its authenticated form
///
/// The leading `0x00` is restored, so the output can go straight to
/// [`verify_command`].
pub fn decrypt_command(wire: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
    let envelope = match wire.split_first() {
        Some((&AUTH_MARKER, rest)) => rest,
        other => {
            return Err(GsatError::MissingMarker {
                layer: Layer::Encryption,
                expected: AUTH_MARKER,
                found: other.map(|(&b, _)| b),
            })
        }
    };

    let plaintext = decrypt_report(envelope, key)?;

    let mut wrapped = Vec::with_capacity(plaintext.len() + 1);
    wrapped.push(AUTH_MARKER);
    wrapped.extend_from_slice(&plaintext);
    Ok(wrapped)
}

/// Decrypt a device report envelope `[0xFF, nonce(7), ciphertext..., tag(8)]`
///
/// # Errors
///
/// Returns error if:
/// - The envelope is shorter than marker, nonce and tag (`TooShort`)
/// - The first byte is not `0xFF` (`MissingMarker`)
/// - The tag does not verify (`DecryptionFailed`)
pub fn decrypt_report(wire: &[u8], key: &EncryptionKey) -> Result<Vec<u8>> {
    if wire.len() < MIN_REPORT_ENVELOPE {
        return Err(GsatError::too_short(Layer::Encryption, wire.len(), MIN_REPORT_ENVELOPE));
    }
    if wire[0] != ENCRYPTION_MARKER {
        return Err(GsatError::MissingMarker {
            layer: Layer::Encryption,
            expected: ENCRYPTION_MARKER,
            found: Some(wire[0]),
        });
    }

    let (nonce, sealed) = wire[1..].split_at(NONCE_LEN);
    trace!("Decrypting with nonce {:?}", String::from_utf8_lossy(nonce));

    key.open(nonce, sealed)
}

/// Wrap a command and, when a key is configured on a binary device, encrypt it
pub fn wrap_and_encrypt(
    command: &[u8],
    credentials: &Credentials,
    counter: u64,
    version: ProtocolVersion,
) -> Result<Vec<u8>> {
    let wrapped = wrap_command(command, &credentials.auth_key, version)?;

    match &credentials.encryption_key {
        Some(key) if version.is_binary() => encrypt_command(&wrapped, key, counter),
        _ => Ok(wrapped),
    }
}

/// Inverse of [`wrap_and_encrypt`]: decrypt if needed, verify, return the command
///
/// # Errors
///
/// Returns `EncryptionKeyRequired` for an encrypted command when no key is
/// configured, plus any error from decryption or HMAC verification.
pub fn decrypt_and_verify(wire: &[u8], credentials: &Credentials, version: ProtocolVersion) -> Result<Vec<u8>> {
    let encrypted = version.is_binary() && wire.get(1) == Some(&ENCRYPTION_MARKER);
    if !encrypted {
        return verify_command(wire, &credentials.auth_key, version);
    }

    let key = credentials
        .encryption_key
        .as_ref()
        .ok_or(GsatError::EncryptionKeyRequired)?;
    let wrapped = decrypt_command(wire, key)?;
    verify_command(&wrapped, &credentials.auth_key, version)
}
