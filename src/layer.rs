use std::fmt;

use ndarray::Array2;
use rand::Rng;

use crate::{Activation, Dense, Dropout, Initialize, Optimizer, Result, Scheduler};

/// One stage of a feed-forward network.
///
/// `forward`/`backward` form a training step: `backward` must receive the same
/// `input` that was given to the matching `forward`, plus `dL/d(output)`, and
/// returns `dL/d(input)`. `infer` is the side-effect-free inference pass.
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    Activation(Activation),
    Dropout(Dropout),
}

impl Layer {
    /// Dense layer with parameters drawn from `init`.
    pub fn dense_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        init: Initialize,
        rng: &mut R,
    ) -> Result<Self> {
        Dense::new_with_rng(in_dim, out_dim, init, rng).map(Layer::Dense)
    }

    /// Dropout layer with drop probability `p`.
    pub fn dropout(p: f32) -> Result<Self> {
        Dropout::new(p).map(Layer::Dropout)
    }

    /// Activation layer; fails if the activation parameters are invalid.
    pub fn activation(activation: Activation) -> Result<Self> {
        activation.validate()?;
        Ok(Layer::Activation(activation))
    }

    /// Training forward pass. Dropout draws its mask from `rng`.
    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Array2<f32>, rng: &mut R) -> Array2<f32> {
        match self {
            Layer::Dense(dense) => dense.forward(input),
            Layer::Activation(act) => act.forward(input),
            Layer::Dropout(dropout) => dropout.forward(input, rng),
        }
    }

    /// Inference forward pass. Dropout is the identity here.
    pub fn infer(&self, input: &Array2<f32>) -> Array2<f32> {
        match self {
            Layer::Dense(dense) => dense.forward(input),
            Layer::Activation(act) => act.forward(input),
            Layer::Dropout(_) => input.clone(),
        }
    }

    /// Backward pass; dense layers also update their parameters.
    pub fn backward(
        &mut self,
        input: &Array2<f32>,
        upstream: &Array2<f32>,
        optimizer: Optimizer,
        scheduler: Scheduler,
        epoch: usize,
    ) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(dense) => Ok(dense.backward(input, upstream, optimizer, scheduler, epoch)),
            Layer::Activation(act) => Ok(act.backward(input, upstream)),
            Layer::Dropout(dropout) => dropout.backward(upstream),
        }
    }

    /// Deep copy with fresh training state (no optimizer history, no dropout mask).
    pub fn copy(&self) -> Self {
        match self {
            Layer::Dense(dense) => Layer::Dense(dense.copy()),
            Layer::Activation(act) => Layer::Activation(*act),
            Layer::Dropout(dropout) => Layer::Dropout(dropout.copy()),
        }
    }

    #[inline]
    pub fn as_dense(&self) -> Option<&Dense> {
        match self {
            Layer::Dense(dense) => Some(dense),
            _ => None,
        }
    }

    #[inline]
    pub fn num_params(&self) -> usize {
        self.as_dense().map_or(0, Dense::num_params)
    }

    /// Output width for an input of width `in_dim`.
    #[inline]
    pub(crate) fn output_width(&self, in_dim: usize) -> usize {
        match self {
            Layer::Dense(dense) => dense.out_dim(),
            Layer::Activation(_) | Layer::Dropout(_) => in_dim,
        }
    }

    /// One-line description.
    pub fn info(&self) -> String {
        match self {
            Layer::Dense(dense) => dense.info(),
            Layer::Activation(act) => act.info(),
            Layer::Dropout(dropout) => format!("Dropout(p={})", dropout.p()),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info())
    }
}

impl From<Dense> for Layer {
    fn from(value: Dense) -> Self {
        Layer::Dense(value)
    }
}

impl From<Activation> for Layer {
    fn from(value: Activation) -> Self {
        Layer::Activation(value)
    }
}

impl From<Dropout> for Layer {
    fn from(value: Dropout) -> Self {
        Layer::Dropout(value)
    }
}
