use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use set_scorigami::fake_corpus::synthetic_matches;
use set_scorigami::match_processor::process_matches_sharded;
use set_scorigami::{compute_transition_rows, generate_all_permutations, process_matches};

fn bench_generate_permutations(c: &mut Criterion) {
    c.bench_function("generate_all_permutations", |b| {
        b.iter(|| {
            let all = generate_all_permutations();
            black_box(all.len());
        })
    });
}

fn bench_process_matches(c: &mut Criterion) {
    let corpus = synthetic_matches(20_000, 17);

    c.bench_function("process_matches_20k", |b| {
        b.iter(|| {
            let out = process_matches(black_box(&corpus), None).unwrap();
            black_box(out.transitions.len());
        })
    });

    c.bench_function("process_matches_sharded_20k", |b| {
        b.iter(|| {
            let out = process_matches_sharded(black_box(&corpus), 2_000).unwrap();
            black_box(out.transitions.len());
        })
    });
}

fn bench_transition_rows(c: &mut Criterion) {
    let out = process_matches(&synthetic_matches(20_000, 29), None).unwrap();

    c.bench_function("compute_transition_rows", |b| {
        b.iter(|| {
            let rows = compute_transition_rows(
                black_box(&out.transitions),
                black_box(&out.total_transitions),
            );
            black_box(rows.len());
        })
    });
}

criterion_group!(
    benches,
    bench_generate_permutations,
    bench_process_matches,
    bench_transition_rows
);
criterion_main!(benches);
