use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::prelude::*;
use simdex::cache::{cached, CacheStrategy};
use simdex::heuristics::MaxDepth;
use simdex::index::{Scored, SimIndex};
use simdex::rank::top_similar;
use simdex::train::Trainer;
use sprs::{CsMat, TriMat};
use std::hint::black_box;
use std::time::Duration;

const MU: f64 = 0.3;
const K: usize = 8;

/// Random symmetric graph: every node gets `degree` undirected partners.
fn random_graph(n: usize, degree: usize, seed: u64) -> CsMat<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut triplets = TriMat::new((n, n));
    for from in 0..n {
        for _ in 0..degree {
            let to = rng.gen_range(0..n);
            if to == from {
                continue;
            }
            triplets.add_triplet(from, to, 1.0);
            triplets.add_triplet(to, from, 1.0);
        }
    }
    triplets.to_csr()
}

fn edge_list(adj: &CsMat<f64>) -> Vec<(usize, usize)> {
    let mut edges = Vec::with_capacity(adj.nnz());
    for (i, row) in adj.outer_iterator().enumerate() {
        for (j, _) in row.iter() {
            edges.push((i, j));
        }
    }
    edges
}

fn trained(n: usize, short_form: bool) -> SimIndex {
    let adj = random_graph(n, 4, 42);
    Trainer::new(MU, K)
        .with_short_form(short_form)
        .fit(&adj)
        .expect("training the benchmark graph")
        .index
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for &n in &[64usize, 128, 256] {
        let adj = random_graph(n, 4, 42);
        group.bench_function(BenchmarkId::new("long_form", n), |b| {
            b.iter(|| {
                let outcome = Trainer::new(MU, K).fit(&adj).unwrap();
                black_box(outcome.index.len());
            })
        });
        group.bench_function(BenchmarkId::new("short_form", n), |b| {
            b.iter(|| {
                let outcome = Trainer::new(MU, K).with_short_form(true).fit(&adj).unwrap();
                black_box(outcome.index.len());
            })
        });
    }
    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_all_pairs_n=128");
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    let strategies = [
        (CacheStrategy::None, "none"),
        (CacheStrategy::Score, "score"),
        (CacheStrategy::Dot, "dot"),
        (CacheStrategy::Precompute, "precompute"),
    ];
    for (strategy, label) in strategies {
        // Precompute only exists for the short form; use it throughout so
        // the strategies are compared on the same index.
        let index = trained(128, true);
        group.bench_function(BenchmarkId::new(label, "short"), |b| {
            b.iter_batched(
                || cached(&index, strategy).unwrap(),
                |mut scorer| {
                    let mut acc = 0.0;
                    for a in 0..128 {
                        for b in 0..128 {
                            acc += scorer.score(a, b).unwrap().value;
                        }
                    }
                    black_box(acc);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_similar_n=256");
    group.warm_up_time(Duration::from_millis(300));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    let adj = random_graph(256, 4, 42);
    let edges = edge_list(&adj);
    let index = Trainer::new(MU, K).fit(&adj).unwrap().index;

    group.bench_function(BenchmarkId::new("full_scan", "k=10"), |b| {
        b.iter(|| {
            let ranked = top_similar(&mut &index, 0, 0..256, 10).unwrap();
            black_box(ranked.len());
        })
    });

    let pruner = MaxDepth::new(&edges, 2);
    // Force the memoized reachable sets outside the measured loop.
    let _ = pruner.top();
    group.bench_function(BenchmarkId::new("pruned_depth2", "k=10"), |b| {
        b.iter(|| {
            let candidates = pruner.top_of(0).unwrap_or(&[]).to_vec();
            let ranked = top_similar(&mut &index, 0, candidates, 10).unwrap();
            black_box(ranked.len());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_training, bench_scoring, bench_ranking);
criterion_main!(benches);
