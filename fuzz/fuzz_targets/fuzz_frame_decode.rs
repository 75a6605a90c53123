#![no_main]

use bytes::BytesMut;
use game_gateway::core::codec::FrameCodec;
use game_gateway::Frame;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Direct decode must never panic
    let _ = Frame::decode(data);
    let _ = Frame::decode_strict(data);

    // Stream splitting followed by decode, as the session read loop does it
    let mut codec = FrameCodec::with_max_frame_size(4096);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(raw)) = codec.decode(&mut buf) {
        if let Ok(frame) = Frame::decode(&raw) {
            let _ = frame.payload_text();
        }
    }
});
