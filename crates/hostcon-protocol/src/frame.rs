//! Length-framed messages exchanged on the command channel.
//!
//! Every message is an 8-byte header, `(kind: i32, size: i32)` in native
//! byte order, followed by exactly `size` bytes of JSON payload. A `Result`
//! payload is an arbitrary JSON value; an `Error` payload is a
//! `[code, text]` pair.

use std::fmt;
use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the fixed message header in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest payload a reader will allocate for (256 MiB).
pub const MAX_PAYLOAD_BYTES: usize = 256 * 1024 * 1024;

pub type FrameResult<T> = std::result::Result<T, FrameError>;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection broken: expected {expected} bytes, received {received}")]
    ConnectionBroken { expected: usize, received: usize },

    #[error("unknown message kind: {0}")]
    UnknownMessageKind(i32),

    #[error("invalid payload size: {0}")]
    InvalidPayloadSize(i64),

    #[error("payload codec error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Kind tag carried in the first header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Result,
    Error,
}

impl MessageKind {
    pub fn code(self) -> i32 {
        match self {
            MessageKind::Result => 0,
            MessageKind::Error => 1,
        }
    }
}

impl TryFrom<i32> for MessageKind {
    type Error = FrameError;

    fn try_from(code: i32) -> FrameResult<Self> {
        match code {
            0 => Ok(MessageKind::Result),
            1 => Ok(MessageKind::Error),
            other => Err(FrameError::UnknownMessageKind(other)),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Result => write!(f, "result"),
            MessageKind::Error => write!(f, "error"),
        }
    }
}

/// Payload of an `Error` message: the host's error code and message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload(pub i32, pub String);

impl ErrorPayload {
    pub fn new(code: i32, text: impl Into<String>) -> Self {
        Self(code, text.into())
    }

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn text(&self) -> &str {
        &self.1
    }
}

/// Header for a payload of `size` bytes; sizes a reader would reject are
/// refused here too.
pub fn encode_header(kind: MessageKind, size: usize) -> FrameResult<[u8; HEADER_LEN]> {
    if size > MAX_PAYLOAD_BYTES {
        return Err(FrameError::InvalidPayloadSize(size as i64));
    }
    let size = i32::try_from(size).map_err(|_| FrameError::InvalidPayloadSize(size as i64))?;
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&kind.code().to_ne_bytes());
    header[4..].copy_from_slice(&size.to_ne_bytes());
    Ok(header)
}

/// Split a header into its kind and payload size.
///
/// Rejects unknown kinds, negative sizes and sizes above
/// [`MAX_PAYLOAD_BYTES`] so that no allocation happens for a corrupt header.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> FrameResult<(MessageKind, usize)> {
    let kind = i32::from_ne_bytes([header[0], header[1], header[2], header[3]]);
    let size = i32::from_ne_bytes([header[4], header[5], header[6], header[7]]);
    let kind = MessageKind::try_from(kind)?;
    let size = usize::try_from(size).map_err(|_| FrameError::InvalidPayloadSize(size.into()))?;
    if size > MAX_PAYLOAD_BYTES {
        return Err(FrameError::InvalidPayloadSize(size as i64));
    }
    Ok((kind, size))
}

/// Header followed by `payload`, ready to be written in one call.
pub fn encode(kind: MessageKind, payload: &[u8]) -> FrameResult<Vec<u8>> {
    let header = encode_header(kind, payload.len())?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Fill `buf` completely, looping over short reads.
///
/// A zero-length read before the buffer is full means the peer went away.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> FrameResult<()> {
    let mut received = 0;
    while received < buf.len() {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(FrameError::ConnectionBroken {
                    expected: buf.len(),
                    received,
                });
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn read_header<R: Read>(reader: &mut R) -> FrameResult<(MessageKind, usize)> {
    let mut header = [0u8; HEADER_LEN];
    fill(reader, &mut header)?;
    decode_header(&header)
}

/// Read exactly `size` payload bytes.
pub fn read_payload<R: Read>(reader: &mut R, size: usize) -> FrameResult<Vec<u8>> {
    let mut payload = vec![0u8; size];
    fill(reader, &mut payload)?;
    Ok(payload)
}

/// Read one complete frame: header, then its payload.
pub fn read_frame<R: Read>(reader: &mut R) -> FrameResult<(MessageKind, Vec<u8>)> {
    let (kind, size) = read_header(reader)?;
    let payload = read_payload(reader, size)?;
    Ok((kind, payload))
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> FrameResult<T> {
    Ok(serde_json::from_slice(payload)?)
}

/// Serialize `value` and write it as a single frame, then flush.
pub fn write_message<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    kind: MessageKind,
    value: &T,
) -> FrameResult<()> {
    let payload = serde_json::to_vec(value)?;
    writer.write_all(&encode(kind, &payload)?)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    /// Reader that hands out at most `chunk` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.chunk).min(self.data.len());
            let n = (end - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn header_is_native_endian_kind_then_size() {
        let frame = encode(MessageKind::Error, b"abc").unwrap();
        assert_eq!(frame.len(), HEADER_LEN + 3);
        assert_eq!(&frame[..4], &1i32.to_ne_bytes());
        assert_eq!(&frame[4..8], &3i32.to_ne_bytes());
        assert_eq!(&frame[8..], b"abc");
    }

    #[test]
    fn header_exact_for_both_kinds_and_size_range() {
        for kind in [MessageKind::Result, MessageKind::Error] {
            for len in [0usize, 1, 7, 8, 255, 4096, 65535, 65536] {
                let payload = vec![0xa5u8; len];
                let frame = encode(kind, &payload).unwrap();
                let header: [u8; HEADER_LEN] = frame[..HEADER_LEN].try_into().unwrap();
                assert_eq!(decode_header(&header).unwrap(), (kind, len));
            }
        }
    }

    #[test]
    fn result_value_survives_framing() {
        let value = json!({
            "atoms": [1, 2, 3],
            "name": "ligand",
            "energy": -12.5,
            "nested": {"ok": true, "none": null}
        });
        let mut wire = Vec::new();
        write_message(&mut wire, MessageKind::Result, &value).unwrap();

        let mut reader = Trickle {
            data: wire,
            pos: 0,
            chunk: 3,
        };
        let (kind, payload) = read_frame(&mut reader).unwrap();
        assert_eq!(kind, MessageKind::Result);
        let decoded: serde_json::Value = decode_payload(&payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn error_payload_is_code_text_pair() {
        let mut wire = Vec::new();
        write_message(
            &mut wire,
            MessageKind::Error,
            &ErrorPayload::new(42, "bad selection"),
        )
        .unwrap();
        assert_eq!(&wire[HEADER_LEN..], br#"[42,"bad selection"]"#);

        let (kind, payload) = read_frame(&mut Cursor::new(wire)).unwrap();
        assert_eq!(kind, MessageKind::Error);
        let err: ErrorPayload = decode_payload(&payload).unwrap();
        assert_eq!(err.code(), 42);
        assert_eq!(err.text(), "bad selection");
    }

    #[test]
    fn short_payload_reports_connection_broken() {
        let mut wire = encode(MessageKind::Result, b"0123456789").unwrap();
        wire.truncate(HEADER_LEN + 4);
        let err = read_frame(&mut Cursor::new(wire)).unwrap_err();
        match err {
            FrameError::ConnectionBroken { expected, received } => {
                assert_eq!(expected, 10);
                assert_eq!(received, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_stream_reports_connection_broken() {
        let err = read_header(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ConnectionBroken {
                expected: HEADER_LEN,
                received: 0
            }
        ));
    }

    #[test]
    fn rejects_unknown_kind_and_negative_size() {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&7i32.to_ne_bytes());
        assert!(matches!(
            decode_header(&header),
            Err(FrameError::UnknownMessageKind(7))
        ));

        header[..4].copy_from_slice(&0i32.to_ne_bytes());
        header[4..].copy_from_slice(&(-1i32).to_ne_bytes());
        assert!(matches!(
            decode_header(&header),
            Err(FrameError::InvalidPayloadSize(-1))
        ));
    }

    #[test]
    fn refuses_to_encode_oversized_payload() {
        assert!(encode_header(MessageKind::Result, MAX_PAYLOAD_BYTES).is_ok());
        assert!(matches!(
            encode_header(MessageKind::Result, MAX_PAYLOAD_BYTES + 1),
            Err(FrameError::InvalidPayloadSize(_))
        ));
    }

    #[test]
    fn rejects_oversized_payload_header() {
        let mut header = [0u8; HEADER_LEN];
        header[4..].copy_from_slice(&i32::MAX.to_ne_bytes());
        assert!(matches!(
            decode_header(&header),
            Err(FrameError::InvalidPayloadSize(_))
        ));
    }
}
