use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::convert::Infallible;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use zipfold_core::cache::LruCache;

fn filled_cache(keys: u64) -> LruCache<u64, Vec<u8>> {
    let cache = LruCache::new("bench", keys * 64 + 1);
    for key in 0..keys {
        cache
            .with_value(key, 64, || Ok::<_, Infallible>(vec![0u8; 64]), |_| ())
            .unwrap();
    }
    cache
}

fn bench_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_hit");

    for keys in [16u64, 1024, 65_536] {
        let cache = filled_cache(keys);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, &keys| {
            let mut key = 0;
            b.iter(|| {
                key = (key + 7) % keys;
                cache
                    .with_value(black_box(key), 64, || Ok::<_, Infallible>(Vec::new()), |v| v.len())
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_eviction_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_churn");

    // Every insertion evicts: the working set is twice the capacity.
    let cache = filled_cache(256);
    group.throughput(Throughput::Elements(1));
    group.bench_function("insert_evict", |b| {
        let mut key = 256u64;
        b.iter(|| {
            key += 1;
            cache
                .with_value(black_box(key % 512 + 1024), 64, || Ok::<_, Infallible>(vec![1u8; 64]), |v| v[0])
                .unwrap()
        });
    });

    group.finish();
}

fn bench_contended_hits(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_contended");

    for threads in [2usize, 8] {
        let cache = Arc::new(filled_cache(1024));
        group.throughput(Throughput::Elements(threads as u64 * 1000));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                thread::scope(|s| {
                    for t in 0..threads {
                        let cache = Arc::clone(&cache);
                        s.spawn(move || {
                            for i in 0..1000u64 {
                                let key = (i * 13 + t as u64) % 1024;
                                cache
                                    .with_value(key, 64, || Ok::<_, Infallible>(Vec::new()), |v| v.len())
                                    .unwrap();
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hits, bench_eviction_churn, bench_contended_hits);
criterion_main!(benches);
