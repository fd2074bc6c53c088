use std::hint::black_box;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use range_space_core::Range;
use range_space_map::Space;

// ---------- Scenario knobs (routing-table shaped) ----------
const SEED: u64 = 0x5EED_CA5E; // deterministic RNG for reproducibility

// Key universe: a /12 worth of IPv4-like addresses.
const UNIVERSE: u32 = 1 << 20;

// Baseline fragmentation: lots of medium prefixes with a few policies.
const BASE_MARKS: usize = 8_000;
const SPAN_MIN: u32 = 16;
const SPAN_MAX: u32 = 4_096;
const POLICIES: u8 = 6;

// Query workload per pass.
const PASS_LOOKUPS: usize = 10_000;

// ----------------------------------------------------------

#[inline]
fn r(lo: u32, hi: u32) -> Range<u32> {
    Range::new(lo, hi)
}

fn random_span<R: Rng + ?Sized>(rng: &mut R) -> Range<u32> {
    let len = rng.random_range(SPAN_MIN..=SPAN_MAX);
    let lo = rng.random_range(0..UNIVERSE - len);
    r(lo, lo + len - 1)
}

// Build a fragmented baseline by layering random policy marks.
fn build_fragmented_base() -> Space<u32, u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut space = Space::new();
    for _ in 0..BASE_MARKS {
        let span = random_span(&mut rng);
        let policy = rng.random_range(0..POLICIES);
        space.mark(span, policy);
    }
    space
}

fn bench_mark(c: &mut Criterion) {
    let base = build_fragmented_base();
    let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ 1);
    c.bench_function("mark/fragmented", |b| {
        b.iter_batched(
            || (base.clone(), random_span(&mut rng), rng.random_range(0..POLICIES)),
            |(mut space, span, policy)| {
                space.mark(span, policy);
                black_box(space.len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_fill(c: &mut Criterion) {
    let base = build_fragmented_base();
    let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ 2);
    c.bench_function("fill/fragmented", |b| {
        b.iter_batched(
            || (base.clone(), random_span(&mut rng), rng.random_range(0..POLICIES)),
            |(mut space, span, policy)| {
                space.fill(span, policy);
                black_box(space.len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_blend(c: &mut Criterion) {
    let base = build_fragmented_base();
    let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ 3);
    c.bench_function("blend/fragmented", |b| {
        b.iter_batched(
            || (base.clone(), random_span(&mut rng), rng.random_range(1..POLICIES)),
            |(mut space, span, color)| {
                space.blend(span, color, |payload, color| {
                    *payload = payload.wrapping_add(*color);
                    *payload != 0
                });
                black_box(space.len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_erase(c: &mut Criterion) {
    let base = build_fragmented_base();
    let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ 4);
    c.bench_function("erase/fragmented", |b| {
        b.iter_batched(
            || (base.clone(), random_span(&mut rng)),
            |(mut space, span)| {
                space.erase(span);
                black_box(space.len())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_lookup(c: &mut Criterion) {
    let base = build_fragmented_base();
    let mut rng = ChaCha8Rng::seed_from_u64(SEED ^ 5);
    let probes: Vec<u32> = (0..PASS_LOOKUPS)
        .map(|_| rng.random_range(0..UNIVERSE))
        .collect();
    c.bench_function("find/point-probes", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for &probe in &probes {
                if base.get(black_box(probe)).is_some() {
                    hits += 1;
                }
            }
            black_box(hits)
        })
    });
}

criterion_group!(
    benches,
    bench_mark,
    bench_fill,
    bench_blend,
    bench_erase,
    bench_lookup
);
criterion_main!(benches);
