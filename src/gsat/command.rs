//! # Command Encoder
//!
//! Encodes operator commands into the byte layout the device firmware expects.
//!
//! Protocol versions below 2 only understand plain ASCII over the legacy text
//! channel. Version 2 and later use typed frames:
//!
//! ```text
//! Raw command:      [0, len, body...]
//! Text:             [1, len, body...]
//! Setting update:   [2, 6, id_lo, id_hi, v0, v1, v2, v3]
//! Settings request: [3, 0]
//! Version request:  [4, 0]
//! ```
//!
//! The output still has to be wrapped (see [`super::auth`]) and optionally
//! encrypted (see [`super::envelope`]) before it is sent.

use tracing::debug;

use super::protocol::*;
use super::settings::encode_setting_update;
use super::text::string_to_ascii;
use crate::error::{GsatError, Layer, Result};

/// Encode an operator command
///
/// # Arguments
///
/// * `command` - Command to encode
/// * `version` - Protocol version of the target device
///
/// # Returns
///
/// * `Result<Vec<u8>>` - Command bytes, ready to be wrapped
///
/// # Errors
///
/// Returns error if:
/// - A text or raw-command body is longer than 226 bytes (`TooLarge`)
/// - A version request targets a device below protocol version 2 (`UnsupportedVersion`)
///
/// # Examples
///
/// ```
/// use gsat_codec::gsat::command::encode_command;
/// use gsat_codec::gsat::protocol::{OutboundCommand, ProtocolVersion};
///
/// let bytes = encode_command(&OutboundCommand::SettingsRequest, ProtocolVersion::ASSUMED).unwrap();
/// assert_eq!(bytes, vec![3, 0]);
/// ```
pub fn encode_command(command: &OutboundCommand, version: ProtocolVersion) -> Result<Vec<u8>> {
    let bytes = match command {
        OutboundCommand::Text { body } => encode_body(MT_TYPE_TEXT, body, version)?,
        OutboundCommand::RawCommand { body } => encode_body(MT_TYPE_RAW_COMMAND, body, version)?,
        OutboundCommand::SettingsRequest => {
            if version.is_binary() {
                vec![MT_TYPE_SETTINGS_REQUEST, 0]
            } else {
                encode_body(MT_TYPE_TEXT, LEGACY_SETTINGS_REQUEST, version)?
            }
        }
        OutboundCommand::VersionRequest => {
            if !version.is_binary() {
                return Err(GsatError::UnsupportedVersion {
                    operation: "version request",
                    version: version.number(),
                });
            }
            vec![MT_TYPE_VERSION_REQUEST, 0]
        }
        OutboundCommand::SettingUpdate { setting, value } => {
            encode_setting_update(*setting, *value, version)
        }
    };

    debug!(
        "Encoded {:?} for protocol v{} ({} bytes)",
        command_kind(command),
        version.number(),
        bytes.len()
    );

    Ok(bytes)
}

/// Encode several setting updates as one command
///
/// # Errors
///
/// Returns `TooLarge` if the combined updates exceed the 228-byte command cap.
pub fn encode_setting_updates(updates: &[(SettingId, i32)], version: ProtocolVersion) -> Result<Vec<u8>> {
    let bytes: Vec<u8> = updates
        .iter()
        .flat_map(|&(setting, value)| encode_setting_update(setting, value, version))
        .collect();

    if bytes.len() > MAX_COMMAND_LEN {
        return Err(GsatError::TooLarge {
            layer: Layer::Framing,
            size: bytes.len(),
            max: MAX_COMMAND_LEN,
        });
    }

    Ok(bytes)
}

/// Encode a length-prefixed ASCII body, or the bare text on legacy devices
fn encode_body(type_byte: u8, body: &str, version: ProtocolVersion) -> Result<Vec<u8>> {
    let ascii = string_to_ascii(body);
    if ascii.len() > MAX_BODY_LEN {
        return Err(GsatError::TooLarge {
            layer: Layer::Framing,
            size: ascii.len(),
            max: MAX_BODY_LEN,
        });
    }

    if !version.is_binary() {
        return Ok(ascii);
    }

    let mut msg = Vec::with_capacity(COMMAND_HEADER_LEN + ascii.len());
    msg.push(type_byte);
    msg.push(ascii.len() as u8);
    msg.extend_from_slice(&ascii);
    Ok(msg)
}

fn command_kind(command: &OutboundCommand) -> &'static str {
    match command {
        OutboundCommand::Text { .. } => "text",
        OutboundCommand::RawCommand { .. } => "raw command",
        OutboundCommand::SettingsRequest => "settings request",
        OutboundCommand::VersionRequest => "version request",
        OutboundCommand::SettingUpdate { .. } => "setting update",
    }
}
