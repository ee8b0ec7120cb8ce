//! Optimizers.
//!
//! `Optimizer` is a stateless, `Copy` hyperparameter bundle. A model holds one and
//! hands it to every layer on each backward pass. A dense layer turns it into its own
//! `OptimizerState` the first time it trains (`Optimizer::instantiate`), and keeps
//! that state for as long as the layer lives.
//!
//! Design notes:
//! - Each trainable parameter group (a layer's weight, its bias) has exactly one
//!   `ParamOptimizer` owning its accumulators. Nothing is shared between layers.
//! - Accumulators are allocated lazily as zeros shaped like the parameter.
//! - Updates are pure in the parameter: `(param, grad) -> new_param`.

use ndarray::{Array, Array1, Array2, Dimension, Ix1, Ix2, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Scheduler};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Optimizer configuration.
pub enum Optimizer {
    /// `p <- p - lr * g`.
    #[default]
    GradientDescent,
    /// Exponential moving average of gradients:
    /// `v <- beta * v + (1 - beta) * g; p <- p - lr * v`.
    Momentum { beta: f32 },
    /// Adam with bias correction. Gradients are clipped to `[-clip, clip]` first.
    Adam {
        beta1: f32,
        beta2: f32,
        eps: f32,
        clip: f32,
    },
}

impl Optimizer {
    /// Adam with `beta1 = 0.9`, `beta2 = 0.999`, `eps = 1e-8`, `clip = 1`.
    pub const fn adam() -> Self {
        Optimizer::Adam {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            clip: 1.0,
        }
    }

    /// Validate optimizer hyperparameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Optimizer::GradientDescent => Ok(()),
            Optimizer::Momentum { beta } => {
                if !(beta.is_finite() && (0.0..1.0).contains(&beta)) {
                    return Err(Error::InvalidConfig(format!(
                        "momentum beta must be finite and in [0,1), got {beta}"
                    )));
                }
                Ok(())
            }
            Optimizer::Adam {
                beta1,
                beta2,
                eps,
                clip,
            } => {
                if !(beta1.is_finite() && (0.0..1.0).contains(&beta1)) {
                    return Err(Error::InvalidConfig(format!(
                        "adam beta1 must be finite and in [0,1), got {beta1}"
                    )));
                }
                if !(beta2.is_finite() && (0.0..1.0).contains(&beta2)) {
                    return Err(Error::InvalidConfig(format!(
                        "adam beta2 must be finite and in [0,1), got {beta2}"
                    )));
                }
                if !(eps.is_finite() && eps > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "adam eps must be finite and > 0, got {eps}"
                    )));
                }
                // `f32::INFINITY` disables clipping.
                if clip.is_nan() || clip <= 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "adam clip must be > 0, got {clip}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Create fresh optimizer state for one dense layer (weight + bias).
    pub fn instantiate(self) -> OptimizerState {
        OptimizerState {
            weight: ParamOptimizer::new(self),
            bias: ParamOptimizer::new(self),
        }
    }

    #[inline]
    pub(crate) fn name(self) -> &'static str {
        match self {
            Optimizer::GradientDescent => "GradientDescent",
            Optimizer::Momentum { .. } => "Momentum",
            Optimizer::Adam { .. } => "Adam",
        }
    }
}

/// Optimizer state bound to one dense layer.
#[derive(Debug, Clone)]
pub struct OptimizerState {
    weight: ParamOptimizer<Ix2>,
    bias: ParamOptimizer<Ix1>,
}

impl OptimizerState {
    /// Returns the configuration this state was created from.
    ///
    /// Instantiating it again gives a state with no accumulated history.
    #[inline]
    pub fn config(&self) -> Optimizer {
        self.weight.config
    }

    /// Update a weight matrix with its gradient.
    pub fn optimize_w(
        &mut self,
        w: &Array2<f32>,
        dw: &Array2<f32>,
        scheduler: Scheduler,
        epoch: usize,
    ) -> Array2<f32> {
        self.weight.step(w, dw, scheduler.get_learning_rate(epoch))
    }

    /// Update a bias vector with its gradient.
    pub fn optimize_b(
        &mut self,
        b: &Array1<f32>,
        db: &Array1<f32>,
        scheduler: Scheduler,
        epoch: usize,
    ) -> Array1<f32> {
        self.bias.step(b, db, scheduler.get_learning_rate(epoch))
    }

    #[inline]
    pub fn weight(&self) -> &ParamOptimizer<Ix2> {
        &self.weight
    }

    #[inline]
    pub fn bias(&self) -> &ParamOptimizer<Ix1> {
        &self.bias
    }
}

/// Accumulators for a single parameter tensor.
#[derive(Debug, Clone)]
pub struct ParamOptimizer<D: Dimension> {
    config: Optimizer,
    t: u64,
    beta1_pow: f32,
    beta2_pow: f32,
    /// Momentum velocity, or Adam's first moment.
    first: Option<Array<f32, D>>,
    /// Adam's second moment.
    second: Option<Array<f32, D>>,
}

impl<D: Dimension> ParamOptimizer<D> {
    pub fn new(config: Optimizer) -> Self {
        Self {
            config,
            t: 0,
            beta1_pow: 1.0,
            beta2_pow: 1.0,
            first: None,
            second: None,
        }
    }

    /// Number of updates applied so far.
    #[inline]
    pub fn steps(&self) -> u64 {
        self.t
    }

    /// Bias-corrected Adam moments `(m_hat, v_hat)` after the latest step.
    ///
    /// Returns `None` for other optimizers or before the first step.
    pub fn bias_corrected(&self) -> Option<(Array<f32, D>, Array<f32, D>)> {
        match (self.config, &self.first, &self.second) {
            (Optimizer::Adam { .. }, Some(m), Some(v)) => {
                let corr1 = 1.0 - self.beta1_pow;
                let corr2 = 1.0 - self.beta2_pow;
                Some((m.mapv(|x| x / corr1), v.mapv(|x| x / corr2)))
            }
            _ => None,
        }
    }

    /// Apply one update with learning rate `lr` and return the new parameter.
    ///
    /// Panics if `param` and `grad` have different shapes.
    pub fn step(&mut self, param: &Array<f32, D>, grad: &Array<f32, D>, lr: f32) -> Array<f32, D> {
        assert_eq!(
            param.shape(),
            grad.shape(),
            "parameter shape {:?} does not match gradient shape {:?}",
            param.shape(),
            grad.shape()
        );
        self.t += 1;

        match self.config {
            Optimizer::GradientDescent => Zip::from(param)
                .and(grad)
                .map_collect(|&p, &g| p - lr * g),
            Optimizer::Momentum { beta } => {
                let v = self
                    .first
                    .get_or_insert_with(|| Array::zeros(param.raw_dim()));
                Zip::from(&mut *v)
                    .and(grad)
                    .for_each(|v, &g| *v = beta * *v + (1.0 - beta) * g);
                Zip::from(param).and(&*v).map_collect(|&p, &v| p - lr * v)
            }
            Optimizer::Adam {
                beta1,
                beta2,
                eps,
                clip,
            } => {
                self.beta1_pow *= beta1;
                self.beta2_pow *= beta2;
                let corr1 = 1.0 - self.beta1_pow;
                let corr2 = 1.0 - self.beta2_pow;

                let m = self
                    .first
                    .get_or_insert_with(|| Array::zeros(param.raw_dim()));
                let v = self
                    .second
                    .get_or_insert_with(|| Array::zeros(param.raw_dim()));

                Zip::from(&mut *m)
                    .and(&mut *v)
                    .and(grad)
                    .for_each(|m, v, &g| {
                        let g = g.clamp(-clip, clip);
                        *m = beta1 * *m + (1.0 - beta1) * g;
                        *v = beta2 * *v + (1.0 - beta2) * (g * g);
                    });

                Zip::from(param)
                    .and(&*m)
                    .and(&*v)
                    .map_collect(|&p, &m, &v| {
                        let m_hat = m / corr1;
                        let v_hat = v / corr2;
                        p - lr * m_hat / (v_hat.sqrt() + eps)
                    })
            }
        }
    }
}
