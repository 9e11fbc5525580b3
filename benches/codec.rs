use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use harp_envsensor::{HarpMessage, MessageType, Payload};

fn sample_frames() -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    for i in 0..256u32 {
        let message = match i % 4 {
            0 => HarpMessage::new(MessageType::Event, 32, Payload::U32(vec![100_000 + i])),
            1 => HarpMessage::new(MessageType::Event, 33, Payload::Float(vec![20.0 + i as f32])),
            2 => HarpMessage::with_timestamp(
                MessageType::Event,
                35,
                i as f64 * 0.5,
                Payload::Float(vec![101_000.0, 21.5, 44.0]),
            ),
            _ => HarpMessage::new(MessageType::Read, 0, Payload::U16(vec![1405])),
        };
        frames.push(message.to_bytes().expect("encode"));
    }
    frames
}

fn bench_decode(c: &mut Criterion) {
    let frames = sample_frames();
    let total: usize = frames.iter().map(Vec::len).sum();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(total as u64));
    group.bench_function("from_bytes", |b| {
        b.iter(|| {
            for frame in &frames {
                black_box(HarpMessage::from_bytes(black_box(frame)).expect("decode"));
            }
        })
    });
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let messages: Vec<HarpMessage> = sample_frames()
        .iter()
        .map(|f| HarpMessage::from_bytes(f).expect("decode"))
        .collect();
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(messages.len() as u64));
    group.bench_function("to_bytes", |b| {
        b.iter(|| {
            for message in &messages {
                black_box(black_box(message).to_bytes().expect("encode"));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode, bench_encode);
criterion_main!(benches);
