use criterion::{black_box, criterion_group, criterion_main, Criterion};
use leqm_dsp::{FilterBank, KWeightFilter};

fn bench_mweight(c: &mut Criterion) {
    let mut bank = FilterBank::new(48000, 2).unwrap();
    c.bench_function("mweight_process_stereo_block", |b| {
        b.iter(|| {
            for i in 0..1024 {
                let x = black_box(i as f64 * 0.0001);
                bank.process(0, x).unwrap();
                bank.process(1, x).unwrap();
            }
        })
    });
}

fn bench_kweight(c: &mut Criterion) {
    let mut filter = KWeightFilter::new(48000, 2).unwrap();
    c.bench_function("kweight_process_stereo_block", |b| {
        b.iter(|| {
            for i in 0..1024 {
                let x = black_box(i as f64 * 0.0001);
                filter.process(0, x).unwrap();
                filter.process(1, x).unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_mweight, bench_kweight);
criterion_main!(benches);
