use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use rust_ffnn::{Activation, Loss, ModelBuilder, Optimizer, Scheduler};

fn main() -> rust_ffnn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Tiny synthetic 3-class dataset in 2D.
    // Each class is a blob around a different center.
    let mut rng = StdRng::seed_from_u64(0);

    let centers = [[-1.0_f32, -1.0], [1.0, -1.0], [0.0, 1.0]];
    let n_per_class = 128;
    let n = centers.len() * n_per_class;
    let mut x = Array2::<f32>::zeros((n, 2));
    let mut y = Array2::<f32>::zeros((n, 3));

    for (class, center) in centers.iter().enumerate() {
        for i in 0..n_per_class {
            let row = class * n_per_class + i;
            x[[row, 0]] = center[0] + rng.gen_range(-0.3..0.3);
            x[[row, 1]] = center[1] + rng.gen_range(-0.3..0.3);
            y[[row, class]] = 1.0;
        }
    }

    // Softmax output feeding cross-entropy on one-hot targets.
    let mut model = ModelBuilder::new(2)?
        .dense(16)?
        .relu()?
        .dropout(0.1)?
        .dense(3)?
        .activation(Activation::Softmax)?
        .loss(Loss::cross_entropy())?
        .optimizer(Optimizer::Momentum { beta: 0.9 })?
        .scheduler(Scheduler::StepDecay {
            lr0: 0.5,
            drop_rate: 0.01,
        })?
        .build_with_seed(0)?;
    model.log();

    let mut loss = f32::NAN;
    for epoch in 0..200 {
        loss = model.fit_with_batch_size(&x, &y, epoch, 32)?;
    }

    let probs = model.predict(&x)?;
    let correct = probs
        .rows()
        .into_iter()
        .zip(y.rows())
        .filter(|(p, t)| argmax(p.iter()) == argmax(t.iter()))
        .count();
    println!("train_loss={loss} accuracy={}", correct as f32 / n as f32);

    Ok(())
}

fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}
