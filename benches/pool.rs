use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use task_pool::Pool;

fn submit_return(c: &mut Criterion) {
    let pool = Pool::new(4);
    c.bench_function("submit_return", |b| {
        b.iter(|| {
            let handle = pool.submit(|| black_box(1) + black_box(1));
            black_box(handle.take().unwrap());
        });
    });
}

fn dependent_chain(c: &mut Criterion) {
    let pool = Pool::new(4);
    c.bench_function("dependent_chain", |b| {
        b.iter(|| {
            let a = pool.submit(|| black_box(7));
            let b2 = pool.submit_with(a, |x: i32| x * 6);
            black_box(b2.take().unwrap());
        });
    });
}

fn fan_out(c: &mut Criterion) {
    let pool = Pool::new(4);
    c.bench_function("fan_out_1000", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..1000).map(|i| pool.submit(move || i)).collect();
            for h in handles {
                black_box(h.take().unwrap());
            }
        });
    });
}

criterion_group!(benches, submit_return, dependent_chain, fan_out);
criterion_main!(benches);
