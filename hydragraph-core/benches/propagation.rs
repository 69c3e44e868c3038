//! Propagation benchmarks: a leaf assignment flowing through a chain of
//! synchronous hydrators, with and without snapshot caching.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use hydragraph_core::{GraphStore, NodeDef};

fn chain(len: usize, cache: bool) -> GraphStore {
    let mut defs = vec![NodeDef::new("n0")];
    for i in 1..len {
        defs.push(
            NodeDef::new(format!("n{i}"))
                .depends_on([format!("n{}", i - 1)])
                .cache(cache)
                .hydrate(|deps| Ok(json!(deps[0].as_i64().unwrap_or(0) + 1))),
        );
    }
    GraphStore::register(defs).unwrap()
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("assign_chain");
    for len in [10usize, 100] {
        for cache in [true, false] {
            let store = chain(len, cache);
            let leaf = store.get("n0").unwrap();
            let mut n = 0i64;
            group.bench_with_input(
                BenchmarkId::new(if cache { "cached" } else { "uncached" }, len),
                &len,
                |b, _| {
                    b.iter(|| {
                        n += 1;
                        leaf.assign(black_box(json!(n)));
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_chain);
criterion_main!(benches);
