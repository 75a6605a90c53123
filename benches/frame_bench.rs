use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use game_gateway::core::codec::FrameCodec;
use game_gateway::core::frame::{encode_body, Frame};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_frame_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode_decode");
    let payload_sizes = [0usize, 64, 512, 4096, 16 * 1024];

    for &size in &payload_sizes {
        let payload = vec![b'a'; size];
        let frame = Frame::new(42, 1002, 0, encode_body(&payload));
        group.throughput(Throughput::Bytes(frame.encoded_len() as u64));

        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || frame.clone(),
                |frame| {
                    let mut buf = BytesMut::with_capacity(frame.encoded_len());
                    let mut codec = FrameCodec::new();
                    codec.encode(frame, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });

        let raw = frame.to_bytes();
        group.bench_function(format!("decode_{size}b"), |b| {
            b.iter(|| {
                let decoded = Frame::decode(&raw);
                assert!(decoded.is_ok());
            })
        });

        group.bench_function(format!("split_and_decode_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::from(&raw[..]),
                |mut buf| {
                    let mut codec = FrameCodec::new();
                    let split = codec.decode(&mut buf).unwrap().unwrap();
                    let decoded = Frame::decode(&split).unwrap();
                    assert_eq!(decoded.segments().count(), size.div_ceil(8));
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame_encode_decode);
criterion_main!(benches);
