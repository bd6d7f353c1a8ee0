//! Benchmarks for partition generation throughput.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use partwise::partition::dictionary::DictionaryGenerator;
use partwise::partition::random::RandomSession;
use partwise::partition::ExceptionSet;
use std::hint::black_box;
use tokio::runtime::Runtime;

fn bench_dictionary_generation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("dictionary_generation");
    for (n, k) in [(16u32, 3u32), (20, 3), (20, 4)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("C({n},{k})")),
            &(n, k),
            |b, &(n, k)| {
                b.iter(|| {
                    let generated = rt.block_on(
                        DictionaryGenerator::new(n, k, ExceptionSet::empty()).generate(),
                    );
                    black_box(generated.unwrap().len())
                });
            },
        );
    }
    group.finish();
}

fn bench_random_generation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("random_generation/1000_of_C(40,5)", |b| {
        b.iter(|| {
            let generated = rt.block_on(
                RandomSession::new(40, 5, 1000, ExceptionSet::empty()).generate(),
            );
            black_box(generated.unwrap().len())
        });
    });
}

criterion_group!(benches, bench_dictionary_generation, bench_random_generation);
criterion_main!(benches);
