use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, error, info};

use crate::{Error, Layer, Loss, Optimizer, Result, Scheduler};

/// A feed-forward network plus its training configuration.
///
/// The model owns its layers (and through them every parameter and optimizer
/// accumulator). `loss`, `optimizer` and `scheduler` are stateless configuration;
/// the optimizer config is only a template from which each dense layer creates
/// its own state on first use.
#[derive(Debug)]
pub struct Model {
    layers: Vec<Layer>,
    input_dim: usize,
    output_dim: usize,
    loss: Loss,
    optimizer: Optimizer,
    scheduler: Scheduler,
    rng: StdRng,
}

impl Model {
    /// Build a model from layers, seeding its RNG from the OS.
    pub fn new(
        layers: Vec<Layer>,
        loss: Loss,
        optimizer: Optimizer,
        scheduler: Scheduler,
    ) -> Result<Self> {
        Self::from_parts(layers, loss, optimizer, scheduler, StdRng::from_entropy())
    }

    /// Build a model with a deterministic RNG (dropout masks, batch shuffling).
    pub fn new_with_seed(
        layers: Vec<Layer>,
        loss: Loss,
        optimizer: Optimizer,
        scheduler: Scheduler,
        seed: u64,
    ) -> Result<Self> {
        Self::from_parts(
            layers,
            loss,
            optimizer,
            scheduler,
            StdRng::seed_from_u64(seed),
        )
    }

    pub(crate) fn from_parts(
        layers: Vec<Layer>,
        loss: Loss,
        optimizer: Optimizer,
        scheduler: Scheduler,
        rng: StdRng,
    ) -> Result<Self> {
        loss.validate()?;
        optimizer.validate()?;
        scheduler.validate()?;

        let input_dim = layers
            .iter()
            .find_map(Layer::as_dense)
            .map(|dense| dense.in_dim())
            .ok_or_else(|| {
                Error::InvalidConfig("model must contain at least one dense layer".to_owned())
            })?;

        let mut width = input_dim;
        for (idx, layer) in layers.iter().enumerate() {
            match layer {
                Layer::Dense(dense) if dense.in_dim() != width => {
                    return Err(Error::InvalidConfig(format!(
                        "layer {idx} in_dim {} does not match previous width {width}",
                        dense.in_dim()
                    )));
                }
                Layer::Activation(act) => act.validate()?,
                _ => {}
            }
            width = layer.output_width(width);
        }

        Ok(Self {
            layers,
            input_dim,
            output_dim: width,
            loss,
            optimizer,
            scheduler,
            rng,
        })
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn loss(&self) -> Loss {
        self.loss
    }

    #[inline]
    pub fn optimizer(&self) -> Optimizer {
        self.optimizer
    }

    #[inline]
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler
    }

    /// Total number of trainable scalars.
    pub fn num_params(&self) -> usize {
        self.layers.iter().map(Layer::num_params).sum()
    }

    /// One training step on a single batch.
    ///
    /// Runs the forward pass, computes the loss, backpropagates through the layers
    /// in reverse and lets every dense layer update its parameters. Returns the loss
    /// measured before the update.
    ///
    /// Fails with `Error::Diverged` if the loss is NaN.
    pub fn fit(&mut self, input: &Array2<f32>, target: &Array2<f32>, epoch: usize) -> Result<f32> {
        self.check_input(input)?;
        self.check_target(input, target)?;
        if input.nrows() == 0 {
            return Err(Error::InvalidShape("fit requires a non-empty batch".to_owned()));
        }

        // activations[i] is the input of layer i; the last entry is the prediction.
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_owned());
        for layer in self.layers.iter_mut() {
            let next = layer.forward(&activations[activations.len() - 1], &mut self.rng);
            activations.push(next);
        }

        let prediction = &activations[self.layers.len()];
        let loss = self.loss.loss(target, prediction);
        if loss.is_nan() {
            error!(epoch, %prediction, "loss is NaN");
            return Err(Error::Diverged { loss });
        }

        let mut grad = self.loss.backward(target, prediction);
        for (idx, layer) in self.layers.iter_mut().enumerate().rev() {
            grad = layer.backward(
                &activations[idx],
                &grad,
                self.optimizer,
                self.scheduler,
                epoch,
            )?;
        }

        Ok(loss)
    }

    /// One pass over a dataset in shuffled mini-batches.
    ///
    /// Rows of `input`/`target` are shuffled together, split into chunks of
    /// `batch_size` (the last one may be smaller) and fed to `fit` in order.
    /// Returns the loss over the whole dataset after all updates.
    pub fn fit_with_batch_size(
        &mut self,
        input: &Array2<f32>,
        target: &Array2<f32>,
        epoch: usize,
        batch_size: usize,
    ) -> Result<f32> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        self.check_input(input)?;
        self.check_target(input, target)?;

        let mut order: Vec<usize> = (0..input.nrows()).collect();
        order.shuffle(&mut self.rng);

        let mut batches = 0_usize;
        for chunk in order.chunks(batch_size) {
            let x = input.select(Axis(0), chunk);
            let y = target.select(Axis(0), chunk);
            self.fit(&x, &y, epoch)?;
            batches += 1;
        }

        let loss = self.evaluate(input, target)?;
        debug!(epoch, batches, batch_size, loss, "epoch finished");
        Ok(loss)
    }

    /// Inference on a batch `(batch, input_dim)`.
    pub fn predict(&self, input: &Array2<f32>) -> Result<Array2<f32>> {
        self.check_input(input)?;
        let mut out = input.to_owned();
        for layer in &self.layers {
            out = layer.infer(&out);
        }
        Ok(out)
    }

    /// Inference on a single feature vector.
    pub fn predict_one(&self, input: &Array1<f32>) -> Result<Array1<f32>> {
        let batch = input.view().insert_axis(Axis(0)).to_owned();
        let out = self.predict(&batch)?;
        Ok(out.index_axis_move(Axis(0), 0))
    }

    /// Loss of the current parameters on `(input, target)`.
    pub fn evaluate(&self, input: &Array2<f32>, target: &Array2<f32>) -> Result<f32> {
        self.check_target(input, target)?;
        let prediction = self.predict(input)?;
        Ok(self.loss.loss(target, &prediction))
    }

    /// Copy with identical parameters and no training history.
    ///
    /// Every dense layer gets fresh weight/bias buffers and starts without optimizer
    /// state, so training the copy never touches this model. Handy for keeping a
    /// frozen target network next to an online one.
    pub fn copy(&self) -> Model {
        Model {
            layers: self.layers.iter().map(Layer::copy).collect(),
            input_dim: self.input_dim,
            output_dim: self.output_dim,
            loss: self.loss,
            optimizer: self.optimizer,
            scheduler: self.scheduler,
            rng: self.rng.clone(),
        }
    }

    /// Multi-line human-readable description of the model.
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.layers.len() + 4);
        lines.push(format!(
            "Model(input_dim={}, output_dim={}, params={})",
            self.input_dim,
            self.output_dim,
            self.num_params()
        ));
        for (idx, layer) in self.layers.iter().enumerate() {
            lines.push(format!("  [{idx}] {layer}"));
        }
        lines.push(format!("  loss: {:?}", self.loss));
        lines.push(format!("  optimizer: {:?}", self.optimizer));
        lines.push(format!("  scheduler: {:?}", self.scheduler));
        lines.join("\n")
    }

    /// Emit `summary` through `tracing` at info level, one event per line.
    pub fn log(&self) {
        for line in self.summary().lines() {
            info!("{line}");
        }
    }

    fn check_input(&self, input: &Array2<f32>) -> Result<()> {
        if input.ncols() != self.input_dim {
            return Err(Error::InvalidShape(format!(
                "input width {} does not match model input_dim {}",
                input.ncols(),
                self.input_dim
            )));
        }
        Ok(())
    }

    fn check_target(&self, input: &Array2<f32>, target: &Array2<f32>) -> Result<()> {
        if target.dim() != (input.nrows(), self.output_dim) {
            return Err(Error::InvalidShape(format!(
                "target shape {:?} does not match (batch, output_dim) = ({}, {})",
                target.dim(),
                input.nrows(),
                self.output_dim
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    use crate::{Activation, Dense, Initialize};

    fn tiny() -> Model {
        let mut rng = StdRng::seed_from_u64(0);
        Model::new_with_seed(
            vec![
                Layer::dense_with_rng(2, 3, Initialize::HeNormal, &mut rng).unwrap(),
                Layer::from(Activation::Tanh),
                Layer::dense_with_rng(3, 1, Initialize::XavierUniform, &mut rng).unwrap(),
            ],
            Loss::Mse,
            Optimizer::GradientDescent,
            Scheduler::Constant { lr: 0.05 },
            0,
        )
        .unwrap()
    }

    #[test]
    fn construction_checks_layer_chain() {
        let mut rng = StdRng::seed_from_u64(0);
        let bad = Model::new_with_seed(
            vec![
                Layer::dense_with_rng(2, 3, Initialize::Zero, &mut rng).unwrap(),
                Layer::from(Activation::Relu),
                Layer::dense_with_rng(4, 1, Initialize::Zero, &mut rng).unwrap(),
            ],
            Loss::Mse,
            Optimizer::GradientDescent,
            Scheduler::default(),
            0,
        );
        assert!(matches!(bad, Err(Error::InvalidConfig(_))));

        let no_dense = Model::new_with_seed(
            vec![Layer::from(Activation::Relu)],
            Loss::Mse,
            Optimizer::GradientDescent,
            Scheduler::default(),
            0,
        );
        assert!(no_dense.is_err());

        let bad_optimizer = Model::new_with_seed(
            vec![Layer::dense_with_rng(2, 1, Initialize::Zero, &mut rng).unwrap()],
            Loss::Mse,
            Optimizer::Momentum { beta: 2.0 },
            Scheduler::default(),
            0,
        );
        assert!(bad_optimizer.is_err());
    }

    #[test]
    fn dims_and_params() {
        let model = tiny();
        assert_eq!(model.input_dim(), 2);
        assert_eq!(model.output_dim(), 1);
        assert_eq!(model.num_params(), (2 * 3 + 3) + (3 + 1));
    }

    #[test]
    fn fit_returns_pre_update_loss() {
        let mut model = tiny();
        let x = array![[0.3_f32, -0.7], [1.0, 0.5]];
        let y = array![[0.2_f32], [-0.4]];

        let before = model.evaluate(&x, &y).unwrap();
        let reported = model.fit(&x, &y, 0).unwrap();
        let after = model.evaluate(&x, &y).unwrap();

        assert!((before - reported).abs() < 1e-6);
        assert!(after < before);
    }

    #[test]
    fn fit_binds_one_optimizer_state_per_dense_layer() {
        let mut model = tiny();
        let x = array![[0.3_f32, -0.7]];
        let y = array![[0.2_f32]];
        model.fit(&x, &y, 0).unwrap();
        model.fit(&x, &y, 1).unwrap();

        for layer in model.layers() {
            if let Some(dense) = layer.as_dense() {
                let state = dense.optimizer_state().unwrap();
                assert_eq!(state.weight().steps(), 2);
                assert_eq!(state.bias().steps(), 2);
            }
        }
    }

    #[test]
    fn predict_one_matches_batched_predict() {
        let model = tiny();
        let x = array![[0.3_f32, -0.7], [1.0, 0.5]];
        let batch = model.predict(&x).unwrap();
        for (i, row) in x.rows().into_iter().enumerate() {
            let single = model.predict_one(&row.to_owned()).unwrap();
            assert_eq!(single.len(), 1);
            assert!((single[0] - batch[[i, 0]]).abs() < 1e-6);
        }
    }

    #[test]
    fn shape_mismatches_are_reported() {
        let mut model = tiny();
        let x_bad = array![[1.0_f32, 2.0, 3.0]];
        assert!(matches!(
            model.predict(&x_bad),
            Err(Error::InvalidShape(_))
        ));

        let x = array![[1.0_f32, 2.0]];
        let y_bad = array![[1.0_f32, 2.0]];
        assert!(matches!(
            model.fit(&x, &y_bad, 0),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            model.evaluate(&x, &y_bad),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            model.fit_with_batch_size(&x, &array![[1.0_f32]], 0, 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn nan_loss_is_fatal() {
        let mut model = tiny();
        let x = array![[f32::NAN, 0.0]];
        let y = array![[1.0_f32]];
        let err = model.fit(&x, &y, 0).unwrap_err();
        assert!(matches!(err, Error::Diverged { .. }));
    }

    #[test]
    fn summary_lists_every_layer() {
        let dense = Dense::from_parts(array![[1.0_f32], [2.0]], array![0.0_f32]).unwrap();
        let model = Model::new_with_seed(
            vec![dense.into(), Layer::from(Activation::sigmoid())],
            Loss::Mse,
            Optimizer::adam(),
            Scheduler::default(),
            0,
        )
        .unwrap();
        let summary = model.summary();
        assert!(summary.starts_with("Model(input_dim=2, output_dim=1, params=3)"));
        assert!(summary.contains("[0] Dense(2 -> 1)"));
        assert!(summary.contains("[1] Sigmoid(zoom=1)"));
        assert!(summary.contains("optimizer: Adam"));
    }
}
