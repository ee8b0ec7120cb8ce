//! Model builder.
//!
//! `ModelBuilder` is the recommended way to define a model.
//!
//! It tracks the running layer width so only compatible chains can be built, and
//! picks a default weight initializer for dense layers that don't name one:
//!
//! - dense feeding `relu` / `leaky relu`: He/Kaiming
//! - anything else: Xavier/Glorot

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{
    Activation, Dropout, Error, Initialize, Layer, LayerConfig, Loss, Model, ModelConfig,
    Optimizer, Result, Scheduler,
};

#[derive(Debug, Clone)]
/// Builder for a `Model`.
///
/// Example:
///
/// ```rust
/// use rust_ffnn::{Activation, Loss, ModelBuilder, Optimizer};
///
/// # fn main() -> rust_ffnn::Result<()> {
/// let model = ModelBuilder::new(2)?
///     .dense(8)?
///     .relu()?
///     .dense(1)?
///     .activation(Activation::sigmoid())?
///     .loss(Loss::Mse)?
///     .optimizer(Optimizer::adam())?
///     .build_with_seed(0)?;
/// assert_eq!(model.output_dim(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ModelBuilder {
    input_dim: usize,
    width: usize,
    layers: Vec<LayerConfig>,
    loss: Loss,
    optimizer: Optimizer,
    scheduler: Scheduler,
}

impl ModelBuilder {
    /// Start building a model that accepts inputs of width `input_dim`.
    pub fn new(input_dim: usize) -> Result<Self> {
        if input_dim == 0 {
            return Err(Error::InvalidConfig("input_dim must be > 0".to_owned()));
        }
        Ok(Self {
            input_dim,
            width: input_dim,
            layers: Vec::new(),
            loss: Loss::default(),
            optimizer: Optimizer::default(),
            scheduler: Scheduler::default(),
        })
    }

    /// Current output width of the chain.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Append a layer described by `config`.
    pub fn layer(mut self, config: LayerConfig) -> Result<Self> {
        match config {
            LayerConfig::Dense { out_dim, init } => {
                if out_dim == 0 {
                    return Err(Error::InvalidConfig("layer out_dim must be > 0".to_owned()));
                }
                if let Some(init) = init {
                    init.validate()?;
                }
                self.width = out_dim;
            }
            LayerConfig::Activation { activation } => activation.validate()?,
            LayerConfig::Dropout { p } => {
                Dropout::new(p)?;
            }
        }
        self.layers.push(config);
        Ok(self)
    }

    /// Add a dense layer with `out_dim` outputs and the default initializer.
    pub fn dense(self, out_dim: usize) -> Result<Self> {
        self.layer(LayerConfig::Dense {
            out_dim,
            init: None,
        })
    }

    /// Add a dense layer with an explicit initializer.
    pub fn dense_with_init(self, out_dim: usize, init: Initialize) -> Result<Self> {
        self.layer(LayerConfig::Dense {
            out_dim,
            init: Some(init),
        })
    }

    pub fn activation(self, activation: Activation) -> Result<Self> {
        self.layer(LayerConfig::Activation { activation })
    }

    pub fn relu(self) -> Result<Self> {
        self.activation(Activation::Relu)
    }

    pub fn dropout(self, p: f32) -> Result<Self> {
        self.layer(LayerConfig::Dropout { p })
    }

    pub fn loss(mut self, loss: Loss) -> Result<Self> {
        loss.validate()?;
        self.loss = loss;
        Ok(self)
    }

    pub fn optimizer(mut self, optimizer: Optimizer) -> Result<Self> {
        optimizer.validate()?;
        self.optimizer = optimizer;
        Ok(self)
    }

    pub fn scheduler(mut self, scheduler: Scheduler) -> Result<Self> {
        scheduler.validate()?;
        self.scheduler = scheduler;
        Ok(self)
    }

    /// Snapshot of the description so far as a `ModelConfig`.
    pub fn to_config(&self, seed: u64) -> ModelConfig {
        ModelConfig {
            input_dim: self.input_dim,
            layers: self.layers.clone(),
            loss: self.loss,
            optimizer: self.optimizer,
            scheduler: self.scheduler,
            seed,
        }
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Model> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided RNG.
    ///
    /// Parameters are drawn from `rng` first; the model's own training RNG is then
    /// seeded from it.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Model> {
        if !self
            .layers
            .iter()
            .any(|l| matches!(l, LayerConfig::Dense { .. }))
        {
            return Err(Error::InvalidConfig(
                "model must have at least one dense layer".to_owned(),
            ));
        }

        let mut layers = Vec::with_capacity(self.layers.len());
        let mut in_dim = self.input_dim;
        for (idx, config) in self.layers.iter().enumerate() {
            let layer = match *config {
                LayerConfig::Dense { out_dim, init } => {
                    let init = init.unwrap_or_else(|| default_init(&self.layers[idx + 1..]));
                    let layer = Layer::dense_with_rng(in_dim, out_dim, init, rng)?;
                    in_dim = out_dim;
                    layer
                }
                LayerConfig::Activation { activation } => Layer::activation(activation)?,
                LayerConfig::Dropout { p } => Layer::dropout(p)?,
            };
            layers.push(layer);
        }

        let model_rng = StdRng::seed_from_u64(rng.next_u64());
        Model::from_parts(layers, self.loss, self.optimizer, self.scheduler, model_rng)
    }
}

/// Initializer for a dense layer followed by `rest`.
fn default_init(rest: &[LayerConfig]) -> Initialize {
    let next = rest
        .iter()
        .find(|l| !matches!(l, LayerConfig::Dropout { .. }));
    match next {
        Some(LayerConfig::Activation {
            activation: Activation::Relu | Activation::LeakyRelu { .. },
        }) => Initialize::HeUniform,
        _ => Initialize::XavierUniform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_running_width() {
        let builder = ModelBuilder::new(3).unwrap().dense(5).unwrap().relu().unwrap();
        assert_eq!(builder.width(), 5);
        let model = builder.dense(2).unwrap().build_with_seed(0).unwrap();
        assert_eq!(model.input_dim(), 3);
        assert_eq!(model.output_dim(), 2);
        assert_eq!(model.num_params(), (3 * 5 + 5) + (5 * 2 + 2));
    }

    #[test]
    fn default_init_follows_activation() {
        let model = ModelBuilder::new(2)
            .unwrap()
            .dense(4)
            .unwrap()
            .dropout(0.1)
            .unwrap()
            .relu()
            .unwrap()
            .dense(1)
            .unwrap()
            .build_with_seed(0)
            .unwrap();
        assert_eq!(model.layers()[0].info(), "Dense(2 -> 4, init=HeUniform)");
        assert_eq!(model.layers()[3].info(), "Dense(4 -> 1, init=XavierUniform)");
    }

    #[test]
    fn rejects_invalid_steps() {
        assert!(ModelBuilder::new(0).is_err());
        let b = ModelBuilder::new(2).unwrap();
        assert!(b.clone().dense(0).is_err());
        assert!(b.clone().dropout(1.5).is_err());
        let wide = Initialize::Uniform {
            min: -f32::MAX,
            max: f32::MAX,
        };
        assert!(matches!(
            b.clone().dense_with_init(2, wide),
            Err(Error::InvalidConfig(_))
        ));
        assert!(b.clone().activation(Activation::LeakyRelu { alpha: f32::NAN }).is_err());
        assert!(b.clone().optimizer(Optimizer::Momentum { beta: 1.0 }).is_err());
        assert!(
            b.clone()
                .scheduler(Scheduler::Constant { lr: 0.0 })
                .is_err()
        );
        assert!(b.clone().loss(Loss::Huber { delta: -1.0 }).is_err());
        assert!(b.relu().unwrap().build_with_seed(0).is_err());
    }

    #[test]
    fn same_seed_same_model() {
        let build = || {
            ModelBuilder::new(4)
                .unwrap()
                .dense(3)
                .unwrap()
                .build_with_seed(11)
                .unwrap()
        };
        let (a, b) = (build(), build());
        assert_eq!(
            a.layers()[0].as_dense().unwrap().weight(),
            b.layers()[0].as_dense().unwrap().weight()
        );
    }

    #[test]
    fn to_config_rebuilds_the_same_network() {
        let builder = ModelBuilder::new(2)
            .unwrap()
            .dense_with_init(3, Initialize::HeNormal)
            .unwrap()
            .relu()
            .unwrap()
            .dense(1)
            .unwrap()
            .optimizer(Optimizer::adam())
            .unwrap();
        let config = builder.to_config(5);
        let a = builder.build_with_seed(5).unwrap();
        let b = config.build().unwrap();
        assert_eq!(a.summary(), b.summary());
        assert_eq!(
            a.layers()[0].as_dense().unwrap().weight(),
            b.layers()[0].as_dense().unwrap().weight()
        );
    }
}
