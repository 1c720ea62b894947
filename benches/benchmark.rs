use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use compatkit::{OrderedDictionary, OrderedSet, from_mixed, to_mixed};

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Reading {
    sensor: String,
    values: Vec<Option<f64>>,
    tags: OrderedDictionary<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Batch {
    site: String,
    readings: Vec<Reading>,
}

fn batch(readings: usize) -> Batch {
    Batch {
        site: "north".to_string(),
        readings: (0..readings)
            .map(|i| Reading {
                sensor: format!("s{i}"),
                values: (0..8).map(|v| if v % 3 == 0 { None } else { Some(v as f64 * 0.5) }).collect(),
                tags: [("unit".to_string(), "C".to_string()), ("room".to_string(), format!("r{}", i % 7))]
                    .into_iter()
                    .collect(),
            })
            .collect(),
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("set append 10k", |b| {
        b.iter(|| {
            let mut set = OrderedSet::with_capacity(10_000);
            for n in 0..10_000u32 {
                set.append(black_box(n));
            }
            set
        })
    });
    let set: OrderedSet<u32> = (0..100_000).collect();
    c.bench_function("set lookup 100k", |b| b.iter(|| set.index_of(black_box(&77_777u32))));

    let mut dictionary: OrderedDictionary<String, u64> = (0..10_000).map(|n| (format!("k{n}"), n)).collect();
    dictionary.shuffle_using(&mut StdRng::seed_from_u64(1));
    c.bench_function("dictionary sort 10k", |b| b.iter(|| dictionary.sorted()));
    c.bench_function("dictionary sort by value 10k", |b| {
        b.iter(|| dictionary.sorted_by(|(_, a), (_, b)| a.cmp(b)))
    });

    let input = batch(200);
    c.bench_function("encode batch 200", |b| b.iter(|| to_mixed(black_box(&input))));
    let tree = to_mixed(&input).unwrap();
    c.bench_function("decode batch 200", |b| b.iter(|| from_mixed::<Batch>(black_box(&tree))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
