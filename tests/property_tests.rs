//! Property-based tests using proptest
//!
//! These tests validate frame and drain-counter invariants across a wide range
//! of randomly generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::BytesMut;
use game_gateway::config::{DELIMITER, HEADER_LEN, MAGIC};
use game_gateway::core::codec::FrameCodec;
use game_gateway::core::frame::{encode_body, Frame};
use game_gateway::error::ProtocolError;
use game_gateway::utils::DrainCounter;
use proptest::prelude::*;
use tokio_util::codec::Decoder;

// Property: decoding arbitrary bytes never panics, and anything accepted is well-formed
proptest! {
    #[test]
    fn prop_decode_never_panics(raw in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(frame) = Frame::decode(&raw) {
            prop_assert_eq!(frame.header.magic, MAGIC);
            prop_assert_eq!(frame.body.len() % 8, 0);
            prop_assert_eq!(raw.last().copied(), Some(DELIMITER));
        }
    }
}

// Property: a body is accepted exactly when its length is a multiple of 8
proptest! {
    #[test]
    fn prop_body_alignment(body_len in 0usize..256) {
        let mut raw = Frame::new(42, 1002, 0, bytes::Bytes::new()).to_bytes();
        raw.pop();
        raw.extend(std::iter::repeat(0x11u8).take(body_len));
        raw.push(DELIMITER);

        match Frame::decode(&raw) {
            Ok(frame) => {
                prop_assert_eq!(body_len % 8, 0);
                prop_assert_eq!(frame.body.len(), body_len);
            }
            Err(ProtocolError::MalformedBody(len)) => {
                prop_assert_ne!(body_len % 8, 0);
                prop_assert_eq!(len, body_len);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
        }
    }
}

// Property: any magic other than 65433 is rejected
proptest! {
    #[test]
    fn prop_wrong_magic_rejected(magic in any::<u32>().prop_filter("not the magic", |m| *m != MAGIC)) {
        let mut raw = Frame::new(42, 1002, 0, bytes::Bytes::new()).to_bytes();
        raw[0..4].copy_from_slice(&magic.to_be_bytes());

        prop_assert!(matches!(Frame::decode(&raw), Err(ProtocolError::BadMagic(m)) if m == magic));
    }
}

// Property: encoded frames declare header plus body as their length
proptest! {
    #[test]
    fn prop_declared_length(payload in "[a-z0-9]{0,64}") {
        let frame = Frame::new(7, 1001, 0, encode_body(payload.as_bytes()));
        let raw = frame.to_bytes();

        prop_assert_eq!(frame.header.length as usize, HEADER_LEN + frame.body.len());
        prop_assert_eq!(raw.len(), frame.encoded_len());
        prop_assert!(Frame::decode_strict(&raw).is_ok());
        prop_assert_eq!(Frame::decode(&raw).unwrap().payload_text(), Some(payload));
    }
}

// Property: the codec yields every frame of a stream regardless of how it is chunked
proptest! {
    #[test]
    fn prop_codec_reassembles_chunks(
        payloads in prop::collection::vec("[a-z]{0,24}", 1..8),
        chunk in 1usize..64,
    ) {
        let frames: Vec<Frame> = payloads
            .iter()
            .enumerate()
            .map(|(i, p)| Frame::new(i as u64 + 1, 1002, 0, encode_body(p.as_bytes())))
            .collect();
        let stream: Vec<u8> = frames.iter().flat_map(|f| f.to_bytes()).collect();

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(raw) = codec.decode(&mut buf).unwrap() {
                decoded.push(Frame::decode(&raw).unwrap());
            }
        }

        prop_assert!(buf.is_empty());
        prop_assert_eq!(decoded, frames);
    }
}

// Property: balanced increments and decrements never drive the counter below zero
proptest! {
    #[test]
    fn prop_drain_counter_balanced(ops in prop::collection::vec(any::<bool>(), 0..200)) {
        let counter = DrainCounter::new();
        let mut expected = 0usize;

        for increment in ops {
            if increment {
                counter.increment();
                expected += 1;
            } else if expected > 0 {
                counter.decrement();
                expected -= 1;
            }
            prop_assert_eq!(counter.count(), expected);
        }

        while expected > 0 {
            counter.decrement();
            expected -= 1;
        }
        prop_assert_eq!(counter.count(), 0);
    }
}

#[test]
#[should_panic(expected = "drain counter decremented below zero")]
fn test_drain_counter_underflow_panics() {
    DrainCounter::new().decrement();
}
