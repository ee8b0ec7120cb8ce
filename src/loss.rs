//! Loss functions.
//!
//! A loss consumes a target `y` and a prediction `y_hat`, both shaped
//! `(batch, output_dim)`, and produces:
//!
//! - a scalar loss value (`Loss::loss`)
//! - the elementwise gradient `dL/d(y_hat)` (`Loss::backward`)
//!
//! Unless stated otherwise the loss is averaged over all `batch * output_dim`
//! elements and the gradient carries the same `1/n` factor.
//!
//! Shape mismatch between `y` and `y_hat` is a programmer error and panics.

use ndarray::{Array2, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Supported loss functions.
pub enum Loss {
    /// Mean squared error: `mean((y - y_hat)^2)`.
    #[default]
    Mse,
    /// Mean absolute error: `mean(|y - y_hat|)`.
    Mae,
    /// Huber loss: quadratic for `|diff| <= delta`, linear beyond.
    Huber { delta: f32 },
    /// Categorical cross-entropy over probabilities.
    ///
    /// Expects one-hot targets and a prediction that already went through a
    /// `Softmax` layer. Predictions are clipped to `[eps, 1 - eps]`. Averaged over
    /// the batch only.
    CrossEntropy { eps: f32 },
}

impl Loss {
    /// Huber loss with `delta = 1`.
    pub const fn huber() -> Self {
        Loss::Huber { delta: 1.0 }
    }

    /// Cross-entropy with `eps = 1e-7`.
    pub const fn cross_entropy() -> Self {
        Loss::CrossEntropy { eps: 1e-7 }
    }

    /// Validate a loss configuration.
    pub fn validate(self) -> Result<()> {
        match self {
            Loss::Mse | Loss::Mae => Ok(()),
            Loss::Huber { delta } => {
                if !(delta.is_finite() && delta > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "huber delta must be finite and > 0, got {delta}"
                    )));
                }
                Ok(())
            }
            Loss::CrossEntropy { eps } => {
                if !(eps.is_finite() && eps > 0.0 && eps < 0.5) {
                    return Err(Error::InvalidConfig(format!(
                        "cross-entropy eps must be finite and in (0, 0.5), got {eps}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Compute the loss value.
    pub fn loss(self, y: &Array2<f32>, y_hat: &Array2<f32>) -> f32 {
        check_shapes(y, y_hat);
        if y.is_empty() {
            return 0.0;
        }

        let n = y.len() as f32;
        match self {
            Loss::Mse => {
                let mut sum = 0.0_f32;
                Zip::from(y).and(y_hat).for_each(|&t, &p| {
                    let diff = t - p;
                    sum = diff.mul_add(diff, sum);
                });
                sum / n
            }
            Loss::Mae => {
                let mut sum = 0.0_f32;
                Zip::from(y)
                    .and(y_hat)
                    .for_each(|&t, &p| sum += (t - p).abs());
                sum / n
            }
            Loss::Huber { delta } => {
                let mut sum = 0.0_f32;
                Zip::from(y).and(y_hat).for_each(|&t, &p| {
                    let abs = (p - t).abs();
                    sum += if abs <= delta {
                        0.5 * abs * abs
                    } else {
                        delta * (abs - 0.5 * delta)
                    };
                });
                sum / n
            }
            Loss::CrossEntropy { eps } => {
                let batch = y.nrows() as f32;
                let mut sum = 0.0_f32;
                Zip::from(y).and(y_hat).for_each(|&t, &p| {
                    if t != 0.0 {
                        sum -= t * p.clamp(eps, 1.0 - eps).ln();
                    }
                });
                sum / batch
            }
        }
    }

    /// Compute `dL/d(y_hat)`. The result has the same shape as the inputs.
    pub fn backward(self, y: &Array2<f32>, y_hat: &Array2<f32>) -> Array2<f32> {
        check_shapes(y, y_hat);
        if y.is_empty() {
            return Array2::zeros(y.raw_dim());
        }

        let inv_n = 1.0 / y.len() as f32;
        match self {
            Loss::Mse => Zip::from(y)
                .and(y_hat)
                .map_collect(|&t, &p| -2.0 * (t - p) * inv_n),
            Loss::Mae => Zip::from(y).and(y_hat).map_collect(|&t, &p| {
                let diff = p - t;
                if diff > 0.0 {
                    inv_n
                } else if diff < 0.0 {
                    -inv_n
                } else {
                    0.0
                }
            }),
            Loss::Huber { delta } => Zip::from(y).and(y_hat).map_collect(|&t, &p| {
                let diff = p - t;
                if diff.abs() <= delta {
                    diff * inv_n
                } else {
                    delta * diff.signum() * inv_n
                }
            }),
            Loss::CrossEntropy { eps } => {
                let inv_batch = 1.0 / y.nrows() as f32;
                Zip::from(y)
                    .and(y_hat)
                    .map_collect(|&t, &p| -t / p.clamp(eps, 1.0 - eps) * inv_batch)
            }
        }
    }
}

#[inline]
fn check_shapes(y: &Array2<f32>, y_hat: &Array2<f32>) {
    assert_eq!(
        y.shape(),
        y_hat.shape(),
        "target shape {:?} does not match prediction shape {:?}",
        y.shape(),
        y_hat.shape()
    );
}
