//! Declarative network description.
//!
//! `ModelConfig` describes an architecture plus its training configuration and
//! builds a freshly initialized `Model` from it. With the `serde` feature it
//! round-trips through JSON:
//!
//! ```json
//! {
//!   "input_dim": 16,
//!   "layers": [
//!     { "kind": "dense", "out_dim": 64, "init": { "kind": "he_normal" } },
//!     { "kind": "activation", "activation": { "kind": "relu" } },
//!     { "kind": "dropout", "p": 0.1 },
//!     { "kind": "dense", "out_dim": 4 }
//!   ],
//!   "loss": { "kind": "huber", "delta": 1.0 },
//!   "optimizer": { "kind": "adam", "beta1": 0.9, "beta2": 0.999, "eps": 1e-8, "clip": 1.0 },
//!   "scheduler": { "kind": "exponential_decay", "lr0": 0.001, "drop_rate": 0.99 },
//!   "seed": 7
//! }
//! ```
//!
//! Only the architecture is described; trained parameters are not part of the format.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Activation, Initialize, Loss, Model, ModelBuilder, Optimizer, Result, Scheduler};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// One layer of a `ModelConfig`.
pub enum LayerConfig {
    /// Dense layer. Without an explicit `init` the builder picks He for layers
    /// feeding a ReLU-family activation and Xavier otherwise.
    Dense {
        out_dim: usize,
        #[cfg_attr(
            feature = "serde",
            serde(default, skip_serializing_if = "Option::is_none")
        )]
        init: Option<Initialize>,
    },
    Activation {
        activation: Activation,
    },
    Dropout {
        p: f32,
    },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub input_dim: usize,
    pub layers: Vec<LayerConfig>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loss: Loss,
    #[cfg_attr(feature = "serde", serde(default))]
    pub optimizer: Optimizer,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scheduler: Scheduler,
    /// Seed for parameter initialization and the model's training RNG.
    #[cfg_attr(feature = "serde", serde(default))]
    pub seed: u64,
}

impl ModelConfig {
    /// Validate every layer and hyperparameter without building.
    pub fn validate(&self) -> Result<()> {
        self.builder().map(|_| ())
    }

    /// Build a freshly initialized model.
    pub fn build(&self) -> Result<Model> {
        self.builder()?.build_with_seed(self.seed)
    }

    fn builder(&self) -> Result<ModelBuilder> {
        let mut builder = ModelBuilder::new(self.input_dim)?;
        for layer in &self.layers {
            builder = builder.layer(*layer)?;
        }
        builder
            .loss(self.loss)?
            .optimizer(self.optimizer)?
            .scheduler(self.scheduler)
    }
}

#[cfg(feature = "serde")]
impl ModelConfig {
    /// Parse and validate a config from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: ModelConfig = serde_json::from_str(s).map_err(|e| {
            crate::Error::InvalidConfig(format!("failed to parse model config json: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            crate::Error::InvalidConfig(format!("failed to serialize model config: {e}"))
        })
    }
}
