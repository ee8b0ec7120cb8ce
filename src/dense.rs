//! Fully connected layer.
//!
//! ```text
//! forward:  Y  = X · W + b            X: (batch, in_dim)  W: (in_dim, out_dim)  b: (out_dim,)
//! backward: dW = Xᵗ · G / m           G: (batch, out_dim), m = batch
//!           db = colsum(G) / m
//!           dX = G · W'ᵗ              W' = weight after this step's update
//! ```
//!
//! The layer owns its parameters and, once it has trained, its optimizer state.
//! The optimizer state is created from the model's `Optimizer` config on the first
//! `backward` call and reused afterwards.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use tracing::debug;

use crate::{Error, Initialize, Optimizer, OptimizerState, Result, Scheduler};

#[derive(Debug, Clone)]
pub struct Dense {
    /// Shape `(in_dim, out_dim)`.
    weight: Array2<f32>,
    /// Shape `(out_dim,)`.
    bias: Array1<f32>,
    init: Option<Initialize>,
    optimizer: Option<OptimizerState>,
}

impl Dense {
    /// Create a layer with parameters drawn from `init`.
    pub fn new_with_rng<R: Rng + ?Sized>(
        in_dim: usize,
        out_dim: usize,
        init: Initialize,
        rng: &mut R,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "dense dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }

        let weight = init.get_weight(in_dim, out_dim, rng)?;
        let bias = init.get_bias(in_dim, out_dim, rng)?;
        Ok(Self {
            weight,
            bias,
            init: Some(init),
            optimizer: None,
        })
    }

    /// Create a layer from explicit parameters.
    ///
    /// `weight` has shape `(in_dim, out_dim)` and `bias` has shape `(out_dim,)`.
    pub fn from_parts(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        let (in_dim, out_dim) = weight.dim();
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidShape(format!(
                "weight dims must be > 0, got ({in_dim}, {out_dim})"
            )));
        }
        if bias.len() != out_dim {
            return Err(Error::InvalidShape(format!(
                "bias length {} does not match weight out_dim {out_dim}",
                bias.len()
            )));
        }
        if weight.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig(
                "weights must contain only finite values".to_owned(),
            ));
        }
        if bias.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig(
                "biases must contain only finite values".to_owned(),
            ));
        }

        Ok(Self {
            weight,
            bias,
            init: None,
            optimizer: None,
        })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.weight.nrows()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.weight.ncols()
    }

    #[inline]
    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    #[inline]
    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    /// The bound optimizer state, if this layer has trained at least once.
    #[inline]
    pub fn optimizer_state(&self) -> Option<&OptimizerState> {
        self.optimizer.as_ref()
    }

    #[inline]
    pub fn num_params(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// `X · W + b`, with the bias broadcast over the batch axis.
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        assert_eq!(
            input.ncols(),
            self.in_dim(),
            "input width {} does not match dense in_dim {}",
            input.ncols(),
            self.in_dim()
        );
        input.dot(&self.weight) + &self.bias
    }

    /// Update the parameters from `upstream = dL/dY` and return `dL/dX`.
    ///
    /// `input` must be the `X` given to the matching `forward`. The returned
    /// gradient is computed with the already-updated weight.
    pub fn backward(
        &mut self,
        input: &Array2<f32>,
        upstream: &Array2<f32>,
        optimizer: Optimizer,
        scheduler: Scheduler,
        epoch: usize,
    ) -> Array2<f32> {
        let batch = input.nrows();
        assert!(batch > 0, "dense backward requires a non-empty batch");
        assert_eq!(
            input.ncols(),
            self.in_dim(),
            "input width {} does not match dense in_dim {}",
            input.ncols(),
            self.in_dim()
        );
        assert_eq!(
            upstream.dim(),
            (batch, self.out_dim()),
            "upstream gradient shape {:?} does not match (batch, out_dim) = ({batch}, {})",
            upstream.dim(),
            self.out_dim()
        );

        let m = batch as f32;
        let dw = input.t().dot(upstream) / m;
        let db = upstream.sum_axis(Axis(0)) / m;

        let (in_dim, out_dim) = self.weight.dim();
        let state = self.optimizer.get_or_insert_with(|| {
            debug!(
                in_dim,
                out_dim,
                optimizer = optimizer.name(),
                "binding optimizer state to dense layer"
            );
            optimizer.instantiate()
        });

        self.weight = state.optimize_w(&self.weight, &dw, scheduler, epoch);
        self.bias = state.optimize_b(&self.bias, &db, scheduler, epoch);

        upstream.dot(&self.weight.t())
    }

    /// Deep copy of the parameters with no optimizer history.
    pub fn copy(&self) -> Self {
        Self {
            weight: self.weight.clone(),
            bias: self.bias.clone(),
            init: self.init,
            optimizer: None,
        }
    }

    pub(crate) fn info(&self) -> String {
        match self.init {
            Some(init) => format!(
                "Dense({} -> {}, init={init:?})",
                self.in_dim(),
                self.out_dim()
            ),
            None => format!("Dense({} -> {})", self.in_dim(), self.out_dim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SGD: Optimizer = Optimizer::GradientDescent;
    const LR: Scheduler = Scheduler::Constant { lr: 0.1 };

    #[test]
    fn forward_shape_and_values() {
        let weight = array![[1.0_f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let dense = Dense::from_parts(weight, array![0.5_f32, -0.5]).unwrap();
        let x = array![[1.0_f32, 0.0, 0.0], [0.0, 1.0, 1.0]];
        let y = dense.forward(&x);
        assert_eq!(y.dim(), (2, 2));
        assert_eq!(y, array![[1.5, 1.5], [8.5, 9.5]]);
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let a = Dense::new_with_rng(4, 3, Initialize::HeNormal, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let b = Dense::new_with_rng(4, 3, Initialize::HeNormal, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let x = array![[0.3_f32, -0.7, 0.1, 0.9]];
        assert_eq!(a.forward(&x), b.forward(&x));
        assert_eq!(a.weight().dim(), (4, 3));
        assert_eq!(a.bias().len(), 3);
    }

    #[test]
    fn backward_applies_averaged_gradients() {
        let mut dense = Dense::from_parts(array![[0.0_f32], [0.0]], array![0.0_f32]).unwrap();
        let x = array![[1.0_f32, 0.0], [0.0, 1.0]];
        let g = array![[-1.0_f32], [-1.0]];

        dense.backward(&x, &g, SGD, LR, 0);

        // dW = Xᵗ G / 2 = [[-0.5], [-0.5]], db = -1
        assert!((dense.weight()[[0, 0]] - 0.05).abs() < 1e-6);
        assert!((dense.weight()[[1, 0]] - 0.05).abs() < 1e-6);
        assert!((dense.bias()[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn downstream_gradient_uses_post_update_weight() {
        let mut dense = Dense::from_parts(array![[1.0_f32]], array![0.0_f32]).unwrap();
        let x = array![[2.0_f32]];
        let g = array![[1.0_f32]];

        let dx = dense.backward(&x, &g, SGD, LR, 0);

        // W' = 1 - 0.1 * (2 * 1) = 0.8; a pre-update rule would give 1.0.
        assert!((dense.weight()[[0, 0]] - 0.8).abs() < 1e-6);
        assert!((dx[[0, 0]] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn optimizer_is_bound_once_on_first_backward() {
        let mut dense = Dense::from_parts(array![[1.0_f32]], array![0.0_f32]).unwrap();
        assert!(dense.optimizer_state().is_none());

        let x = array![[1.0_f32]];
        let g = array![[1.0_f32]];
        dense.backward(&x, &g, Optimizer::adam(), LR, 0);
        // A different config on later calls does not replace the bound state.
        dense.backward(&x, &g, SGD, LR, 1);

        let state = dense.optimizer_state().unwrap();
        assert_eq!(state.config(), Optimizer::adam());
        assert_eq!(state.weight().steps(), 2);
        assert_eq!(state.bias().steps(), 2);
    }

    #[test]
    fn copy_keeps_parameters_and_drops_optimizer_state() {
        let mut dense = Dense::from_parts(array![[1.0_f32, 2.0]], array![0.0_f32, 1.0]).unwrap();
        dense.backward(&array![[1.0_f32]], &array![[1.0_f32, 1.0]], SGD, LR, 0);

        let copy = dense.copy();
        assert_eq!(copy.weight(), dense.weight());
        assert_eq!(copy.bias(), dense.bias());
        assert!(copy.optimizer_state().is_none());
        assert!(dense.optimizer_state().is_some());
    }

    #[test]
    fn from_parts_validates_shapes_and_values() {
        assert!(Dense::from_parts(array![[1.0_f32, 2.0]], array![0.0_f32]).is_err());
        assert!(Dense::from_parts(array![[f32::NAN]], array![0.0_f32]).is_err());
        assert!(Dense::new_with_rng(0, 1, Initialize::Zero, &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    #[should_panic(expected = "does not match dense in_dim")]
    fn forward_panics_on_input_width_mismatch() {
        let dense = Dense::from_parts(array![[1.0_f32], [1.0]], array![0.0_f32]).unwrap();
        dense.forward(&array![[1.0_f32, 2.0, 3.0]]);
    }
}
