use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rust_ffnn::{Initialize, Loss, Model, ModelBuilder, Optimizer, Scheduler};

const CELLS: usize = 16;
const ACTIONS: usize = 4;
const GAMMA: f32 = 0.9;
const SYNC_EVERY: usize = 20;

/// A toy environment over a 4x4 board: the reward for an action is the
/// (normalized) sum of the board row it points at, and the next state is the
/// board rotated by one cell.
struct Toy {
    rng: StdRng,
}

impl Toy {
    fn state(&mut self) -> Array1<f32> {
        Array1::from_shape_simple_fn(CELLS, || self.rng.gen_range(0..12) as f32 / 11.0)
    }

    fn step(&self, state: &Array1<f32>, action: usize) -> (f32, Array1<f32>) {
        let reward = state.slice(ndarray::s![action * 4..action * 4 + 4]).sum() / 4.0;
        let mut next = state.clone();
        let first = next[0];
        for i in 0..CELLS - 1 {
            next[i] = next[i + 1];
        }
        next[CELLS - 1] = first;
        (reward, next)
    }
}

fn q_network() -> rust_ffnn::Result<Model> {
    ModelBuilder::new(CELLS)?
        .dense_with_init(64, Initialize::HeNormal)?
        .relu()?
        .dense(64)?
        .relu()?
        .dense(ACTIONS)?
        .loss(Loss::huber())?
        .optimizer(Optimizer::adam())?
        .scheduler(Scheduler::ExponentialDecay {
            lr0: 1e-3,
            drop_rate: 0.995,
        })?
        .build_with_seed(42)
}

fn main() -> rust_ffnn::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut env = Toy {
        rng: StdRng::seed_from_u64(0),
    };
    let mut online = q_network()?;
    let mut target = online.copy();
    online.log();

    let batch = 32;
    for epoch in 0..200 {
        let mut states = Array2::<f32>::zeros((batch, CELLS));
        for mut row in states.rows_mut() {
            row.assign(&env.state());
        }

        // Bellman targets: start from the online estimate and overwrite the taken action.
        let mut targets = online.predict(&states)?;
        for (i, state) in states.rows().into_iter().enumerate() {
            let action = env.rng.gen_range(0..ACTIONS);
            let (reward, next) = env.step(&state.to_owned(), action);
            let next_q = target.predict_one(&next)?;
            let best = next_q.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            targets[[i, action]] = reward + GAMMA * best;
        }

        let loss = online.fit_with_batch_size(&states, &targets, epoch, 8)?;

        if (epoch + 1) % SYNC_EVERY == 0 {
            target = online.copy();
            let probe = states.index_axis(Axis(0), 0).to_owned();
            info!(
                epoch,
                loss,
                q = %online.predict_one(&probe)?,
                "synced target network"
            );
        }
    }

    Ok(())
}
