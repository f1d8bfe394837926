//! Framing codec.
//!
//! A frame is `[START_TOKEN][len_hi][len_lo][payload]`, where `len` is the
//! payload size in bytes, big-endian. The codec writes into caller-owned
//! buffers and owns none itself.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Cursor;

use crate::error::CodecError;

pub const START_TOKEN: u8 = b'$';
pub const HEADER_LEN: usize = 3;

/// Encode `payload` as a frame at the start of `dest`. Returns the frame length.
///
/// Fails with `InsufficientCapacity` when header plus payload do not fit;
/// bytes past the returned length may have been scribbled on either way.
pub fn encode<T: Serialize + ?Sized>(payload: &T, dest: &mut [u8]) -> Result<usize, CodecError> {
    let capacity = dest.len();
    if capacity < HEADER_LEN {
        return Err(CodecError::InsufficientCapacity { capacity });
    }
    let (header, body) = dest.split_at_mut(HEADER_LEN);
    let mut cursor = Cursor::new(body);
    serde_json::to_writer(&mut cursor, payload).map_err(|e| {
        if e.is_io() {
            CodecError::InsufficientCapacity { capacity }
        } else {
            CodecError::Serialize(e.to_string())
        }
    })?;
    let len = usize::try_from(cursor.position()).map_err(|_| CodecError::PayloadTooLong(capacity))?;
    let len16 = u16::try_from(len).map_err(|_| CodecError::PayloadTooLong(len))?;
    header[0] = START_TOKEN;
    header[1..].copy_from_slice(&len16.to_be_bytes());
    Ok(HEADER_LEN + len)
}

/// Encode into a freshly allocated frame.
pub fn encode_to_vec<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, CodecError> {
    let body = serde_json::to_vec(payload).map_err(|e| CodecError::Serialize(e.to_string()))?;
    let len16 = u16::try_from(body.len()).map_err(|_| CodecError::PayloadTooLong(body.len()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.push(START_TOKEN);
    frame.extend_from_slice(&len16.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Frame length `payload` would encode to, without writing it anywhere.
pub fn encoded_len<T: Serialize + ?Sized>(payload: &T) -> Result<usize, CodecError> {
    struct Counter(usize);
    impl std::io::Write for Counter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0 += buf.len();
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    let mut counter = Counter(0);
    serde_json::to_writer(&mut counter, payload).map_err(|e| CodecError::Serialize(e.to_string()))?;
    Ok(HEADER_LEN + counter.0)
}

/// Decode exactly one payload (no header).
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(payload).map_err(CodecError::Deserialize)
}

/// Payload length declared by a header, if `bytes` starts with one.
pub fn declared_len(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [START_TOKEN, hi, lo, ..] => Some(usize::from(u16::from_be_bytes([*hi, *lo]))),
        _ => None,
    }
}

/// Iterate the payloads of complete frames in an outbound byte stream.
/// Bytes before a start token are skipped; a trailing partial frame is ignored.
pub fn frames(mut bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    std::iter::from_fn(move || {
        let start = bytes.iter().position(|&b| b == START_TOKEN)?;
        bytes = &bytes[start..];
        let len = declared_len(bytes)?;
        if bytes.len() < HEADER_LEN + len {
            return None;
        }
        let (frame, rest) = bytes.split_at(HEADER_LEN + len);
        bytes = rest;
        Some(&frame[HEADER_LEN..])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_is_token_and_big_endian_length() {
        let mut buf = [0u8; 64];
        let n = encode(&json!({"msg": "hi"}), &mut buf).unwrap();
        assert_eq!(buf[0], b'$');
        assert_eq!(usize::from(u16::from_be_bytes([buf[1], buf[2]])), n - HEADER_LEN);
        assert_eq!(&buf[HEADER_LEN..n], br#"{"msg":"hi"}"#);
    }

    #[test]
    fn too_small_destination_fails() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            encode(&json!({"msg": "hello world"}), &mut buf),
            Err(CodecError::InsufficientCapacity { capacity: 8 })
        ));
        assert!(matches!(
            encode(&json!(1), &mut buf[..2]),
            Err(CodecError::InsufficientCapacity { capacity: 2 })
        ));
    }

    #[test]
    fn encode_to_vec_matches_in_place_encoding() {
        let payload = json!({"a": [1, 2, 3]});
        let mut buf = [0u8; 32];
        let n = encode(&payload, &mut buf).unwrap();
        assert_eq!(encode_to_vec(&payload).unwrap(), &buf[..n]);
    }

    #[test]
    fn frames_skips_noise_and_partial_tail() {
        let mut stream = b"xx".to_vec();
        stream.extend(encode_to_vec(&json!({"n": 1})).unwrap());
        stream.extend(encode_to_vec(&json!({"n": 2})).unwrap());
        stream.extend_from_slice(b"$\x00\x10{\"n\"");
        let got: Vec<&[u8]> = frames(&stream).collect();
        assert_eq!(got, vec![&br#"{"n":1}"#[..], &br#"{"n":2}"#[..]]);
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        let err = decode::<serde_json::Value>(b"{\"n\":").unwrap_err();
        assert!(matches!(err, CodecError::Deserialize(_)));
    }
}
