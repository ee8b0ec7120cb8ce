use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array2;

use rust_ffnn::{Model, ModelBuilder, Optimizer};

fn q_net() -> Model {
    ModelBuilder::new(16)
        .and_then(|b| b.dense(64))
        .and_then(|b| b.relu())
        .and_then(|b| b.dense(64))
        .and_then(|b| b.relu())
        .and_then(|b| b.dense(4))
        .and_then(|b| b.optimizer(Optimizer::adam()))
        .and_then(|b| b.build_with_seed(0))
        .unwrap()
}

fn model_predict_bench(c: &mut Criterion) {
    let model = q_net();
    let input = Array2::<f32>::from_elem((32, model.input_dim()), 0.1);

    c.bench_function("model_predict_16_64_64_4_batch32", |b| {
        b.iter(|| {
            let out = model.predict(black_box(&input)).unwrap();
            black_box(out);
        })
    });
}

fn model_fit_bench(c: &mut Criterion) {
    let mut model = q_net();
    let input = Array2::<f32>::from_elem((32, model.input_dim()), 0.1);
    let target = Array2::<f32>::zeros((32, model.output_dim()));

    c.bench_function("model_fit_16_64_64_4_batch32", |b| {
        b.iter(|| {
            let loss = model.fit(black_box(&input), black_box(&target), 0).unwrap();
            black_box(loss);
        })
    });
}

criterion_group!(benches, model_predict_bench, model_fit_bench);
criterion_main!(benches);
