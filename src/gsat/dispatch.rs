//! # Message Dispatcher
//!
//! Routes a device-originated message to its codec by the leading type byte.
//! Encrypted messages (type 255) are opened first and dispatched on the type
//! byte of the plaintext.

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use super::envelope::{decrypt_report, EncryptionKey};
use super::position::{decode_eighteen_byte, decode_ten_byte};
use super::protocol::*;
use super::settings::decode_settings;
use super::text::decode_text;
use crate::error::{GsatError, Layer, Result};

/// Decode a device-originated message
///
/// # Arguments
///
/// * `bytes` - Message as received, type byte first
/// * `encryption_key` - Key for encrypted messages, if the device has one
/// * `received_at` - Reception time, used to date 10-byte position reports
///
/// # Returns
///
/// * `Result<Option<InboundMessage>>` - Decoded message, or `None` for the
///   software-version marker (type 3), which carries nothing the settings dump
///   does not
///
/// # Errors
///
/// Returns error if:
/// - `bytes` is empty (`TooShort`)
/// - The message is encrypted and no key is configured (`EncryptionKeyRequired`)
/// - Decryption fails (`DecryptionFailed`)
/// - The message uses the legacy GSE format, type 0 or 128 (`UnsupportedFormat`)
/// - The type byte is not defined (`UnknownMessageType`)
/// - The payload is too short for its codec (`TooShort`)
pub fn decode_message(
    bytes: &[u8],
    encryption_key: Option<&EncryptionKey>,
    received_at: Option<DateTime<Utc>>,
) -> Result<Option<InboundMessage>> {
    let &type_byte = bytes
        .first()
        .ok_or_else(|| GsatError::too_short(Layer::Framing, 0, 1))?;

    if type_byte != MO_TYPE_ENCRYPTED {
        return decode_plaintext(bytes, received_at);
    }

    let key = encryption_key.ok_or(GsatError::EncryptionKeyRequired)?;
    let plaintext = decrypt_report(bytes, key)?;
    trace!("Decrypted {} byte report: {}", bytes.len(), hex::encode(&plaintext));

    match plaintext.first() {
        // Nested envelopes are not part of the protocol
        Some(&MO_TYPE_ENCRYPTED) => Err(GsatError::UnknownMessageType(MO_TYPE_ENCRYPTED)),
        Some(_) => decode_plaintext(&plaintext, received_at),
        None => Err(GsatError::too_short(Layer::Framing, 0, 1)),
    }
}

fn decode_plaintext(bytes: &[u8], received_at: Option<DateTime<Utc>>) -> Result<Option<InboundMessage>> {
    let (&type_byte, payload) = bytes
        .split_first()
        .ok_or_else(|| GsatError::too_short(Layer::Framing, 0, 1))?;

    let message = match type_byte {
        MO_TYPE_TEXT => InboundMessage::Text(decode_text(payload)?),
        MO_TYPE_SETTINGS => InboundMessage::Settings(decode_settings(payload)?),
        MO_TYPE_SOFTWARE_VERSION => {
            debug!("Ignoring software version marker");
            return Ok(None);
        }
        MO_TYPE_TEN_BYTE_POSITION => InboundMessage::Position(decode_ten_byte(payload, received_at)?),
        MO_TYPE_EIGHTEEN_BYTE_POSITION => InboundMessage::Position(decode_eighteen_byte(payload)?),
        MO_TYPE_GSE | MO_TYPE_GSE_EXTENDED => {
            warn!("Rejected legacy GSE report (type {})", type_byte);
            return Err(GsatError::UnsupportedFormat(type_byte));
        }
        other => {
            warn!("Rejected unknown message type {}", other);
            return Err(GsatError::UnknownMessageType(other));
        }
    };

    debug!("Dispatched message type {} ({} bytes)", type_byte, bytes.len());
    Ok(Some(message))
}
