//! A minimal feed-forward neural network training engine.
//!
//! `rust-ffnn` trains small dense networks on `ndarray` batches: dense layers,
//! element-wise activations, softmax and dropout, with gradient descent, momentum
//! or Adam, learning-rate schedules and the usual regression/classification losses.
//! It is sized for workloads like a value network for a board-game agent: a few
//! layers, small batches, many short `fit` calls.
//!
//! # Design goals
//!
//! - Explicit ownership: each dense layer owns its parameters and its optimizer state.
//!   `Optimizer`, `Loss` and `Scheduler` are plain `Copy` configuration values.
//! - Reproducibility: every random draw (initialization, dropout masks, batch shuffling)
//!   comes from an RNG handle that can be seeded.
//! - Clear contracts: shapes are explicit and validated at the `Model` boundary.
//!
//! # Panics vs `Result`
//!
//! This crate exposes two layers of API:
//!
//! - Low-level numeric kernels (panic on misuse):
//!   - [`Dense::forward`], [`Dense::backward`], [`Activation::backward`]
//!   - [`Loss::loss`], [`Loss::backward`], [`ParamOptimizer::step`]
//!     Shape mismatches are treated as programmer error and panic via `assert!`.
//!
//! - High-level model APIs (shape-checked):
//!   - [`Model::fit`], [`Model::fit_with_batch_size`], [`Model::predict`],
//!     [`Model::predict_one`], [`Model::evaluate`]
//!     These validate inputs and return [`Result`]. A NaN training loss is reported as
//!     [`Error::Diverged`].
//!
//! # Data layout and shapes
//!
//! - Scalars are `f32`.
//! - Batches are `Array2<f32>` with shape `(batch, features)`.
//! - Dense weights have shape `(in_dim, out_dim)`, biases `(out_dim,)`.
//!
//! # Logging
//!
//! The crate emits `tracing` events (optimizer binding and epoch summaries at `debug`,
//! [`Model::log`] at `info`, divergence at `error`). Install any subscriber to see them.
//!
//! # MSRV
//!
//! This crate's minimum supported Rust version (MSRV) is specified in `Cargo.toml`.

//! # Quick start
//!
//! ```rust
//! use ndarray::array;
//! use rust_ffnn::{Activation, Loss, ModelBuilder, Optimizer, Scheduler};
//!
//! # fn main() -> rust_ffnn::Result<()> {
//! let x = array![[0.0_f32, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
//! let y = array![[0.0_f32], [1.0], [1.0], [0.0]];
//!
//! let mut model = ModelBuilder::new(2)?
//!     .dense(8)?
//!     .relu()?
//!     .dense(1)?
//!     .activation(Activation::sigmoid())?
//!     .loss(Loss::Mse)?
//!     .optimizer(Optimizer::adam())?
//!     .scheduler(Scheduler::Constant { lr: 0.05 })?
//!     .build_with_seed(0)?;
//!
//! for epoch in 0..200 {
//!     model.fit_with_batch_size(&x, &y, epoch, 2)?;
//! }
//! let _p = model.predict_one(&array![1.0_f32, 0.0])?;
//! Ok(())
//! # }
//! ```

//! # Target networks
//!
//! [`Model::copy`] gives an independent network with the same parameters and no
//! optimizer history, which is what a frozen target network needs:
//!
//! ```rust
//! use ndarray::array;
//! use rust_ffnn::{Loss, ModelBuilder, Optimizer};
//!
//! # fn main() -> rust_ffnn::Result<()> {
//! let mut online = ModelBuilder::new(3)?
//!     .dense(4)?
//!     .relu()?
//!     .dense(2)?
//!     .loss(Loss::huber())?
//!     .optimizer(Optimizer::adam())?
//!     .build_with_seed(1)?;
//! let target = online.copy();
//!
//! let x = array![[0.1_f32, -0.2, 0.3]];
//! online.fit(&x, &array![[1.0_f32, 0.0]], 0)?;
//! assert_ne!(online.predict(&x)?, target.predict(&x)?);
//! Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod config;
pub mod dense;
pub mod dropout;
pub mod error;
pub mod init;
pub mod layer;
pub mod loss;
pub mod model;
pub mod optim;
pub mod scheduler;

pub use activation::Activation;
pub use builder::ModelBuilder;
pub use config::{LayerConfig, ModelConfig};
pub use dense::Dense;
pub use dropout::Dropout;
pub use error::{Error, Result};
pub use init::Initialize;
pub use layer::Layer;
pub use loss::Loss;
pub use model::Model;
pub use optim::{Optimizer, OptimizerState, ParamOptimizer};
pub use scheduler::Scheduler;
