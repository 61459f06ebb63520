//! # Text Message Codec
//!
//! Device text messages (type 1) carry a length-prefixed destination followed
//! by the message body: `[dest_len, dest(dest_len), body...]`.

use tracing::debug;

use super::protocol::TextMessage;
use crate::error::{GsatError, Layer, Result};

/// Replacement for bytes and characters outside 7-bit ASCII
const ASCII_REPLACEMENT: u8 = b'?';

/// Decode a device text message
///
/// A destination length running past the end of the payload is clamped: the
/// destination takes what is left and the body is empty.
///
/// # Errors
///
/// Returns `TooShort` if the payload has no destination length byte.
pub fn decode_text(payload: &[u8]) -> Result<TextMessage> {
    let (&dest_len, rest) = payload
        .split_first()
        .ok_or_else(|| GsatError::too_short(Layer::Codec, 0, 1))?;

    let split = (dest_len as usize).min(rest.len());
    let (destination, body) = rest.split_at(split);

    debug!(
        "Decoded text message: {} byte destination, {} byte body",
        destination.len(),
        body.len()
    );

    Ok(TextMessage {
        destination: ascii_to_string(destination),
        body: ascii_to_string(body),
    })
}

/// Decode ASCII bytes, replacing anything above 0x7F with `?`
pub fn ascii_to_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { ASCII_REPLACEMENT as char })
        .collect()
}

/// Encode text as ASCII, replacing non-ASCII characters with `?`
pub fn string_to_ascii(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { ASCII_REPLACEMENT })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_sample() {
        let mut payload = vec![0x0F];
        payload.extend_from_slice(b"support@gsat.us");
        payload.extend_from_slice(b"Thank you for your interest in the GSatMicro!");

        let message = decode_text(&payload).unwrap();
        assert_eq!(message.destination, "support@gsat.us");
        assert_eq!(message.body, "Thank you for your interest in the GSatMicro!");
    }

    #[test]
    fn test_decode_text_every_destination_length() {
        for dest_len in 0..=255usize {
            let mut payload = vec![dest_len as u8];
            payload.extend(std::iter::repeat(b'd').take(dest_len));
            payload.extend_from_slice(b"body");

            let message = decode_text(&payload).unwrap();
            assert_eq!(message.destination.len(), dest_len);
            assert_eq!(message.body, "body");
        }
    }

    #[test]
    fn test_decode_text_destination_past_end() {
        let message = decode_text(&[10, b'a', b'b']).unwrap();
        assert_eq!(message.destination, "ab");
        assert_eq!(message.body, "");
    }

    #[test]
    fn test_decode_text_empty_destination() {
        let message = decode_text(&[0, b'h', b'i']).unwrap();
        assert_eq!(message.destination, "");
        assert_eq!(message.body, "hi");
    }

    #[test]
    fn test_decode_text_empty_payload() {
        assert!(matches!(
            decode_text(&[]),
            Err(GsatError::TooShort { layer: Layer::Codec, .. })
        ));
    }

    #[test]
    fn test_non_ascii_replaced() {
        assert_eq!(ascii_to_string(&[b'o', 0xE9, b'k']), "o?k");
        assert_eq!(string_to_ascii("caf\u{e9}"), b"caf?".to_vec());
        assert_eq!(string_to_ascii("plain"), b"plain".to_vec());
    }
}
