//! Micro-benchmark for the interrupt marker claim/release pair.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vmport_core::InterruptContext;

fn bench_enter_leave(c: &mut Criterion) {
    let ctx = InterruptContext::new();
    c.bench_function("enter_leave_uncontended", |b| {
        b.iter(|| {
            let entered = black_box(&ctx).enter();
            ctx.leave(entered);
        })
    });

    c.bench_function("is_in_interrupt", |b| {
        b.iter(|| black_box(&ctx).is_in_interrupt())
    });
}

criterion_group!(benches, bench_enter_leave);
criterion_main!(benches);
