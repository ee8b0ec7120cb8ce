use ndarray::array;
use tracing_subscriber::EnvFilter;

use rust_ffnn::{Activation, Loss, ModelBuilder, Optimizer, Scheduler};

fn main() -> rust_ffnn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Classic XOR dataset.
    let x = array![[0.0_f32, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let y = array![[0.0_f32], [1.0], [1.0], [0.0]];

    // 2 -> 8 -> 1 network.
    // ReLU hidden layer, sigmoid output for a probability-like output.
    let mut model = ModelBuilder::new(2)?
        .dense(8)?
        .relu()?
        .dense(1)?
        .activation(Activation::sigmoid())?
        .loss(Loss::Mse)?
        .optimizer(Optimizer::adam())?
        .scheduler(Scheduler::Constant { lr: 0.05 })?
        .build_with_seed(0)?;
    model.log();

    let mut loss = f32::NAN;
    for epoch in 0..2_000 {
        loss = model.fit(&x, &y, epoch)?;
    }
    println!("final_loss_from_fit={loss} train_mse={}", model.evaluate(&x, &y)?);

    for row in x.rows() {
        let out = model.predict_one(&row.to_owned())?;
        println!("x={row} y={}", out[0]);
    }

    Ok(())
}
