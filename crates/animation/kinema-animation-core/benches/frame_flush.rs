use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use kinema_animation_core::{animate, animate_value, AnimateOptions, Easing, Engine, MotionConfig, MotionValue, Transition, Value};

fn running_engine(count: usize) -> (Engine, Vec<MotionValue>) {
    let engine = Engine::new(MotionConfig::manual());
    let values: Vec<MotionValue> = (0..count).map(|_| engine.motion_value(0.0)).collect();
    for (i, value) in values.iter().enumerate() {
        if i % 2 == 0 {
            animate_value(&engine, value, 100.0, Transition::tween(10.0, Easing::EaseInOut));
        } else {
            animate(
                &engine,
                value,
                "x",
                vec![None, Some(Value::Number(100.0))],
                AnimateOptions::default(),
            );
        }
    }
    (engine, values)
}

fn bench_frame_flush(c: &mut Criterion) {
    for count in [10usize, 100, 1000] {
        c.bench_function(&format!("frame_flush_{count}"), |b| {
            b.iter_batched(
                || running_engine(count),
                |(engine, values)| {
                    engine.frameloop().process_batch();
                    black_box(values[0].get());
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_steady_state(c: &mut Criterion) {
    let (engine, values) = running_engine(500);
    c.bench_function("frame_flush_steady_500", |b| {
        b.iter(|| {
            engine.frameloop().process_batch();
            black_box(values[values.len() - 1].get());
        })
    });
}

criterion_group!(benches, bench_frame_flush, bench_steady_state);
criterion_main!(benches);
