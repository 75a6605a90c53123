//! # Frame
//!
//! The wire unit of the gateway protocol: a fixed 28-byte big-endian header,
//! an 8-byte-aligned body and a one byte delimiter.
//!
//! ```text
//! [Magic(4)] [Length(4)] [Identity(8)] [Main(4)] [Sub(4)] [Encryption(4)] [Body(N*8)] [0x0A]
//! ```
//!
//! Decoding is pure. It never touches session state; the caller applies any
//! authentication side effect after a successful decode.

use bytes::{BufMut, Bytes, BytesMut};
use std::slice::ChunksExact;

use crate::config::{DELIMITER, HEADER_LEN, MAGIC, MIN_FRAME_LEN, SEGMENT_LEN};
use crate::error::{ProtocolError, Result};

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u32,
    /// Declared frame length (header plus body, delimiter excluded)
    pub length: u32,
    /// Caller identity, 0 before authentication
    pub identity: u64,
    pub main_command: u32,
    pub sub_command: u32,
    /// Reserved. Carried but never acted upon.
    pub encryption: u32,
}

impl FrameHeader {
    fn parse(header: &[u8]) -> Self {
        Self {
            magic: read_u32(&header[0..4]),
            length: read_u32(&header[4..8]),
            identity: read_u64(&header[8..16]),
            main_command: read_u32(&header[16..20]),
            sub_command: read_u32(&header[20..24]),
            encryption: read_u32(&header[24..28]),
        }
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u32(self.magic);
        dst.put_u32(self.length);
        dst.put_u64(self.identity);
        dst.put_u32(self.main_command);
        dst.put_u32(self.sub_command);
        dst.put_u32(self.encryption);
    }
}

/// A complete protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl Frame {
    /// Build an outbound frame. The length field is derived from the body.
    ///
    /// `body` must be 8-byte aligned; use [`encode_body`] to build one from a payload.
    pub fn new(identity: u64, main_command: u32, sub_command: u32, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        debug_assert_eq!(body.len() % SEGMENT_LEN, 0, "frame body must be 8-byte aligned");
        Self {
            header: FrameHeader {
                magic: MAGIC,
                length: (HEADER_LEN + body.len()) as u32,
                identity,
                main_command,
                sub_command,
                encryption: 0,
            },
            body,
        }
    }

    /// Decode a raw delimited frame as split off the stream by the codec.
    ///
    /// The declared length is surfaced but not verified.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < MIN_FRAME_LEN {
            return Err(ProtocolError::TruncatedFrame(raw.len()));
        }
        if raw[raw.len() - 1] != DELIMITER {
            return Err(ProtocolError::MissingDelimiter);
        }

        let header = FrameHeader::parse(&raw[..HEADER_LEN]);
        if header.magic != MAGIC {
            return Err(ProtocolError::BadMagic(header.magic));
        }

        let body = &raw[HEADER_LEN..raw.len() - 1];
        if body.len() % SEGMENT_LEN != 0 {
            return Err(ProtocolError::MalformedBody(body.len()));
        }

        Ok(Self {
            header,
            body: Bytes::copy_from_slice(body),
        })
    }

    /// Like [`Frame::decode`], but also rejects frames whose declared length
    /// disagrees with the bytes actually read.
    pub fn decode_strict(raw: &[u8]) -> Result<Self> {
        let frame = Self::decode(raw)?;
        let actual = raw.len() - 1;
        if frame.header.length as usize != actual {
            return Err(ProtocolError::LengthMismatch {
                declared: frame.header.length,
                actual,
            });
        }
        Ok(frame)
    }

    pub fn identity(&self) -> u64 {
        self.header.identity
    }

    pub fn main_command(&self) -> u32 {
        self.header.main_command
    }

    pub fn sub_command(&self) -> u32 {
        self.header.sub_command
    }

    /// Payload segments of the body, skipping each message's length prefix
    pub fn segments(&self) -> BodySegments<'_> {
        BodySegments {
            chunks: self.body.chunks_exact(SEGMENT_LEN),
        }
    }

    /// Payload segments joined into text, with zero padding trimmed.
    ///
    /// Returns `None` if the payload is not valid UTF-8.
    pub fn payload_text(&self) -> Option<String> {
        let mut payload = Vec::with_capacity(self.body.len() / 2);
        for segment in self.segments() {
            payload.extend_from_slice(segment);
        }
        while payload.last() == Some(&0) {
            payload.pop();
        }
        String::from_utf8(payload).ok()
    }

    /// Number of bytes this frame occupies on the wire, delimiter included
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.body.len() + 1
    }

    /// Append the wire form of this frame to `dst`
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        self.header.write(dst);
        dst.put_slice(&self.body);
        dst.put_u8(DELIMITER);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.to_vec()
    }
}

/// Lazy iterator over the payload segments of a frame body.
///
/// Every logical message is a length-prefix segment followed by a payload
/// segment; prefixes are skipped without being interpreted.
pub struct BodySegments<'a> {
    chunks: ChunksExact<'a, u8>,
}

impl<'a> Iterator for BodySegments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next()?;
        self.chunks.next()
    }
}

/// Build an aligned body from a payload.
///
/// The payload is cut into 8-byte chunks; each is written as a big-endian
/// length-prefix segment followed by the chunk padded with zeros.
pub fn encode_body(payload: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(payload.len().div_ceil(SEGMENT_LEN) * SEGMENT_LEN * 2);
    for chunk in payload.chunks(SEGMENT_LEN) {
        body.put_u64(chunk.len() as u64);
        body.put_slice(chunk);
        body.put_bytes(0, SEGMENT_LEN - chunk.len());
    }
    body.freeze()
}

#[inline]
fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}

#[inline]
fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw_frame(magic: u32, declared: u32, body: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&magic.to_be_bytes());
        raw.extend_from_slice(&declared.to_be_bytes());
        raw.extend_from_slice(&42u64.to_be_bytes());
        raw.extend_from_slice(&1001u32.to_be_bytes());
        raw.extend_from_slice(&7u32.to_be_bytes());
        raw.extend_from_slice(&0u32.to_be_bytes());
        raw.extend_from_slice(body);
        raw.push(DELIMITER);
        raw
    }

    #[test]
    fn decodes_header_fields() {
        let raw = raw_frame(MAGIC, 44, &[0u8; 16]);
        let frame = Frame::decode(&raw).unwrap();

        assert_eq!(frame.header.magic, 65433);
        assert_eq!(frame.header.length, 44);
        assert_eq!(frame.identity(), 42);
        assert_eq!(frame.main_command(), 1001);
        assert_eq!(frame.sub_command(), 7);
        assert_eq!(frame.header.encryption, 0);
        assert_eq!(frame.body.len(), 16);
    }

    #[test]
    fn accepts_empty_body() {
        let raw = raw_frame(MAGIC, 28, &[]);
        assert_eq!(raw.len(), MIN_FRAME_LEN);
        let frame = Frame::decode(&raw).unwrap();
        assert!(frame.body.is_empty());
        assert_eq!(frame.segments().count(), 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut raw = raw_frame(MAGIC, 28, &[]);
        raw[0] = 0x01;
        assert!(matches!(
            Frame::decode(&raw),
            Err(ProtocolError::BadMagic(0x0100_FF99))
        ));
    }

    #[test]
    fn rejects_unaligned_body() {
        let raw = raw_frame(MAGIC, 33, &[1, 2, 3, 4, 5]);
        assert!(matches!(
            Frame::decode(&raw),
            Err(ProtocolError::MalformedBody(5))
        ));
    }

    #[test]
    fn rejects_short_input() {
        assert!(matches!(
            Frame::decode(&[0x00, 0x00, 0xFF, 0x99]),
            Err(ProtocolError::TruncatedFrame(4))
        ));
        assert!(matches!(
            Frame::decode(&[]),
            Err(ProtocolError::TruncatedFrame(0))
        ));
    }

    #[test]
    fn rejects_missing_delimiter() {
        let mut raw = raw_frame(MAGIC, 28, &[]);
        *raw.last_mut().unwrap() = 0xFF;
        assert!(matches!(
            Frame::decode(&raw),
            Err(ProtocolError::MissingDelimiter)
        ));
    }

    #[test]
    fn declared_length_is_advisory_unless_strict() {
        let raw = raw_frame(MAGIC, 999, &[0u8; 8]);
        assert!(Frame::decode(&raw).is_ok());
        assert!(matches!(
            Frame::decode_strict(&raw),
            Err(ProtocolError::LengthMismatch {
                declared: 999,
                actual: 36
            })
        ));

        let raw = raw_frame(MAGIC, 36, &[0u8; 8]);
        assert!(Frame::decode_strict(&raw).is_ok());
    }

    #[test]
    fn segments_skip_length_prefixes() {
        let mut body = Vec::new();
        body.extend_from_slice(&5u64.to_be_bytes());
        body.extend_from_slice(b"hello\0\0\0");
        body.extend_from_slice(&5u64.to_be_bytes());
        body.extend_from_slice(b"world\0\0\0");
        let frame = Frame::new(1, 1001, 0, body);

        let segments: Vec<&[u8]> = frame.segments().collect();
        assert_eq!(segments, vec![&b"hello\0\0\0"[..], &b"world\0\0\0"[..]]);
    }

    #[test]
    fn trailing_prefix_without_payload_is_ignored() {
        let frame = Frame::new(1, 1001, 0, 3u64.to_be_bytes().to_vec());
        assert_eq!(frame.segments().count(), 0);
    }

    #[test]
    fn payload_text_joins_chunks() {
        let frame = Frame::new(9, 1001, 0, encode_body(b"token-0123456789"));
        assert_eq!(frame.body.len(), 32);
        assert_eq!(frame.payload_text().as_deref(), Some("token-0123456789"));

        let frame = Frame::new(9, 1001, 0, encode_body(b"abc"));
        assert_eq!(frame.body.len(), 16);
        assert_eq!(frame.payload_text().as_deref(), Some("abc"));
    }

    #[test]
    fn encoded_frames_decode_strictly() {
        let frame = Frame::new(77, 1002, 3, encode_body(b"signed"));
        let bytes = frame.to_bytes();

        assert_eq!(bytes.len(), frame.encoded_len());
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0xFF, 0x99]);
        assert_eq!(*bytes.last().unwrap(), DELIMITER);
        assert_eq!(Frame::decode_strict(&bytes).unwrap(), frame);
    }
}
