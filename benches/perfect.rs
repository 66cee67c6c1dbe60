use criterion::{black_box, criterion_group, criterion_main, Criterion};
use perfect_index::{BuildOptions, PerfectIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}
criterion_main!(benches);

fn criterion_benchmark(crit: &mut Criterion) {
    for size in [10usize, 50, 100, 200] {
        /* Same keys every run: the seed pins both keys and search order */
        let mut seed = [0u8; 32];
        seed[0..4].copy_from_slice(&(size as u32).to_le_bytes());
        let mut rng: StdRng = SeedableRng::from_seed(seed);
        let keys: Vec<u64> = (0..size).map(|_| rng.gen::<u64>()).collect();

        let options = BuildOptions { seed: Some(size as u64), ..BuildOptions::default() };

        crit.bench_function(&format!("build {}", size), |crit| {
            crit.iter(|| PerfectIndex::build(black_box(&keys), &options).unwrap())
        });

        let built = PerfectIndex::build(&keys, &options).unwrap();
        let mut i = 0;
        crit.bench_function(&format!("index {}", size), |crit| {
            crit.iter(|| {
                i = (i + 1) % keys.len();
                black_box(built.index(keys[i]))
            })
        });
    }
}
