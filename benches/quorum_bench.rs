//! Criterion micro-benchmarks for the hot deterministic paths:
//! - quorum evaluation over a full descriptor set
//! - state descriptor encode/decode
//!
//! Run with: `cargo bench --bench quorum_bench`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use uuid::Uuid;

use quorate::descriptor::StateDescriptor;
use quorate::member::MemberStatus;
use quorate::quorum;
use quorate::types::{ProtoVersion, Seqno};

fn descriptors(count: usize, established: Uuid) -> Vec<StateDescriptor> {
    (0..count)
        .map(|i| {
            // half the members carry the reference, the rest are fresh
            let (uuid, act, conf, status) = if i % 2 == 0 {
                (established, 1000 + i as i64, 10, MemberStatus::Synced)
            } else {
                (Uuid::nil(), -1, -1, MemberStatus::Prim)
            };
            StateDescriptor::new(
                Uuid::nil(),
                uuid,
                Seqno::new(act),
                Seqno::new(conf),
                status,
                format!("node-{i}"),
                format!("10.0.0.{i}:4567"),
                ProtoVersion::new(0),
                ProtoVersion::new(2),
            )
            .unwrap()
        })
        .collect()
}

fn bench_quorum_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("quorum_evaluate");
    let established = Uuid::new_v4();

    for size in [3usize, 16, 64] {
        let descs = descriptors(size, established);
        let refs: Vec<&StateDescriptor> = descs.iter().collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &refs, |b, refs| {
            b.iter(|| quorum::evaluate(black_box(refs)));
        });
    }
    group.finish();
}

fn bench_descriptor_codec(c: &mut Criterion) {
    let desc = descriptors(1, Uuid::new_v4()).remove(0);
    let bytes = desc.to_bytes().unwrap();

    c.bench_function("descriptor_encode", |b| {
        b.iter(|| black_box(&desc).to_bytes().unwrap());
    });
    c.bench_function("descriptor_decode", |b| {
        b.iter(|| StateDescriptor::from_bytes(black_box(&bytes)).unwrap());
    });
}

criterion_group!(benches, bench_quorum_evaluate, bench_descriptor_codec);
criterion_main!(benches);
