use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{DELIMITER, MAX_FRAME_SIZE};
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};

/// Stream codec splitting inbound bytes on the frame delimiter.
///
/// Decoding yields the raw frame, delimiter included, for [`Frame::decode`] to
/// validate. Encoding writes a complete [`Frame`].
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    // Bytes already scanned for the delimiter, so partial reads are not rescanned
    next_index: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// `max_frame_size` bounds a raw frame, delimiter included
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            next_index: 0,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        let read_to = src.len().min(self.max_frame_size);

        match src[self.next_index..read_to]
            .iter()
            .position(|b| *b == DELIMITER)
        {
            Some(offset) => {
                let end = self.next_index + offset + 1;
                self.next_index = 0;
                Ok(Some(src.split_to(end)))
            }
            None if src.len() >= self.max_frame_size => {
                let len = src.len();
                self.next_index = 0;
                src.clear();
                Err(ProtocolError::OversizedFrame(len))
            }
            None => {
                self.next_index = read_to;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                // Peer hung up halfway through a frame
                let len = src.len();
                self.next_index = 0;
                src.clear();
                Err(ProtocolError::TruncatedFrame(len))
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.encoded_len() > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(frame.encoded_len()));
        }
        frame.write_to(dst);
        Ok(())
    }
}
