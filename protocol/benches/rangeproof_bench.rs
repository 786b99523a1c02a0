// Range-proof benchmarks for the SHADE protocol.
//
// Proving and verifying under each backend, plus batch verification for the
// bulletproof backend at a few batch sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

use shade_protocol::crypto::commitment::random_scalar;
use shade_protocol::rangeproof::{RangeProofBackendKind, RangeProofEngine};

const BACKENDS: [RangeProofBackendKind; 3] = [
    RangeProofBackendKind::Strong,
    RangeProofBackendKind::Simulated,
    RangeProofBackendKind::Emulated,
];

fn bench_prove(c: &mut Criterion) {
    let mut group = c.benchmark_group("rangeproof/prove");
    let r = random_scalar(&mut StdRng::seed_from_u64(3));

    for kind in BACKENDS {
        let engine = RangeProofEngine::from_kind(kind, false).unwrap();
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| engine.create_range_proof(1000, 0, 5000, &r).unwrap());
        });
    }

    group.finish();
}

fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("rangeproof/verify");
    let r = random_scalar(&mut StdRng::seed_from_u64(4));

    for kind in BACKENDS {
        let engine = RangeProofEngine::from_kind(kind, false).unwrap();
        let (commitment, proof) = engine.create_range_proof(1000, 0, 5000, &r).unwrap();
        group.bench_function(kind.as_str(), |b| {
            b.iter(|| engine.validate_range_proof(&commitment, &proof, 0, 5000));
        });
    }

    group.finish();
}

fn bench_batch_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("rangeproof/batch_verify");
    group.sample_size(10);
    let engine = RangeProofEngine::from_kind(RangeProofBackendKind::Strong, true).unwrap();
    let mut rng = StdRng::seed_from_u64(5);

    for size in [4usize, 16, 64] {
        let items: Vec<_> = (0..size)
            .map(|i| {
                let r = random_scalar(&mut rng);
                engine.create_range_proof(i as u64 * 10, 0, 1_000_000, &r).unwrap()
            })
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| assert!(engine.validate_batch(items, 0, 1_000_000)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_prove, bench_verify, bench_batch_verify);
criterion_main!(benches);
