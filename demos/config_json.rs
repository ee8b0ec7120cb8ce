use ndarray::Array2;
use tracing_subscriber::EnvFilter;

use rust_ffnn::{Initialize, Loss, ModelBuilder, ModelConfig, Optimizer, Scheduler};

fn main() -> rust_ffnn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let builder = ModelBuilder::new(16)?
        .dense_with_init(64, Initialize::HeNormal)?
        .relu()?
        .dense(4)?
        .loss(Loss::huber())?
        .optimizer(Optimizer::adam())?
        .scheduler(Scheduler::ExponentialDecay {
            lr0: 1e-3,
            drop_rate: 0.99,
        })?;

    let json = builder.to_config(7).to_json_string_pretty()?;
    println!("{json}");

    let config = ModelConfig::from_json_str(&json)?;
    let rebuilt = config.build()?;
    let original = builder.build_with_seed(7)?;

    let x = Array2::<f32>::from_elem((1, 16), 0.5);
    println!(
        "original={} rebuilt={}",
        original.predict(&x)?,
        rebuilt.predict(&x)?
    );
    rebuilt.log();

    Ok(())
}
