//! LEGO NXT direct-command framing for mailbox messages.
//!
//! Telemetry strings are delivered as `MESSAGEWRITE` direct commands without
//! reply. Over Bluetooth every telegram carries a little-endian `u16` length
//! prefix:
//!
//! ```text
//! len_lo len_hi | 0x80 0x09 mailbox size | payload... 0x00
//! ```
//!
//! `size` counts the payload plus its NUL terminator.

use crate::LinkError;

/// Direct command, no reply requested.
pub const DIRECT_COMMAND_NO_REPLY: u8 = 0x80;
/// `MESSAGEWRITE` opcode.
pub const MESSAGE_WRITE: u8 = 0x09;
/// Highest inbox number on the brick.
pub const MAX_MAILBOX: u8 = 9;
/// Longest payload, excluding the terminator.
pub const MAX_MESSAGE_LEN: usize = 58;

/// Encode `payload` as a length-prefixed `MESSAGEWRITE` telegram.
pub fn encode_message_write(mailbox: u8, payload: &str) -> Result<Vec<u8>, LinkError> {
    if mailbox > MAX_MAILBOX {
        return Err(LinkError::InvalidMailbox(mailbox));
    }
    let bytes = payload.as_bytes();
    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(LinkError::PayloadTooLong {
            len: bytes.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    if bytes.contains(&0) {
        return Err(LinkError::InvalidPayload);
    }

    let body_len = 4 + bytes.len() + 1;
    let mut frame = Vec::with_capacity(2 + body_len);
    frame.extend_from_slice(&(body_len as u16).to_le_bytes());
    frame.push(DIRECT_COMMAND_NO_REPLY);
    frame.push(MESSAGE_WRITE);
    frame.push(mailbox);
    frame.push((bytes.len() + 1) as u8);
    frame.extend_from_slice(bytes);
    frame.push(0);
    Ok(frame)
}

/// Inverse of [`encode_message_write`]: `(mailbox, payload)`.
pub fn decode_message_write(frame: &[u8]) -> Option<(u8, &str)> {
    let (len, body) = frame.split_first_chunk::<2>()?;
    if u16::from_le_bytes(*len) as usize != body.len() || body.len() < 5 {
        return None;
    }
    if body[0] != DIRECT_COMMAND_NO_REPLY || body[1] != MESSAGE_WRITE {
        return None;
    }
    let size = body[3] as usize;
    let text = body.get(4..4 + size)?;
    let (&nul, text) = text.split_last()?;
    if nul != 0 {
        return None;
    }
    Some((body[2], std::str::from_utf8(text).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_message_write() {
        let frame = encode_message_write(0, "a;1;2;3").expect("encode");
        assert_eq!(
            frame,
            [
                12, 0, 0x80, 0x09, 0, 8, b'a', b';', b'1', b';', b'2', b';', b'3', 0
            ]
        );
        assert_eq!(decode_message_write(&frame), Some((0, "a;1;2;3")));
    }

    #[test]
    fn rejects_oversized_and_invalid_messages() {
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert!(matches!(
            encode_message_write(0, &long),
            Err(LinkError::PayloadTooLong { len: 59, max: 58 })
        ));
        assert!(encode_message_write(0, &long[..MAX_MESSAGE_LEN]).is_ok());
        assert!(matches!(
            encode_message_write(10, "x"),
            Err(LinkError::InvalidMailbox(10))
        ));
        assert!(matches!(
            encode_message_write(1, "a\0b"),
            Err(LinkError::InvalidPayload)
        ));
    }

    #[test]
    fn decode_rejects_truncated_frames() {
        let frame = encode_message_write(3, "hello").expect("encode");
        assert_eq!(decode_message_write(&frame[..frame.len() - 1]), None);
        assert_eq!(decode_message_write(&[]), None);
    }
}
