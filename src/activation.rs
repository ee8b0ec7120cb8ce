//! Activation functions.
//!
//! Activations are parameter-free layers. `forward` maps the input tensor
//! `(batch, features)` to an output of the same shape. `backward` receives the
//! *input* that was fed to `forward` together with the upstream gradient
//! `dL/d(output)` and returns `dL/d(input)`.
//!
//! Every derivative is expressed as a function of the cached input, so callers
//! only need to keep the layer inputs around during a training step.

use ndarray::{Array2, Axis, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// Element-wise (or row-wise, for `Softmax`) activation function.
pub enum Activation {
    Relu,
    LeakyRelu {
        alpha: f32,
    },
    Tanh,
    /// `1 / (1 + exp(-x / zoom))`.
    Sigmoid {
        zoom: f32,
    },
    /// `log_base(1 + base^clip(x))` with `clip(x) = x.clamp(-max_clip, max_clip)`.
    SoftPlus {
        base: f32,
        max_clip: f32,
    },
    /// Row-wise softmax.
    Softmax,
}

impl Activation {
    /// Sigmoid with `zoom = 1`.
    pub const fn sigmoid() -> Self {
        Activation::Sigmoid { zoom: 1.0 }
    }

    /// Natural softplus (`base = e`) clipped at `|x| <= 30`.
    pub const fn softplus() -> Self {
        Activation::SoftPlus {
            base: std::f32::consts::E,
            max_clip: 30.0,
        }
    }

    /// Validate activation parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Activation::LeakyRelu { alpha } => {
                if !(alpha.is_finite() && alpha >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "leaky ReLU alpha must be finite and >= 0, got {alpha}"
                    )));
                }
            }
            Activation::Sigmoid { zoom } => {
                if !(zoom.is_finite() && zoom > 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "sigmoid zoom must be finite and > 0, got {zoom}"
                    )));
                }
            }
            Activation::SoftPlus { base, max_clip } => {
                if !(base.is_finite() && base > 1.0) {
                    return Err(Error::InvalidConfig(format!(
                        "softplus base must be finite and > 1, got {base}"
                    )));
                }
                if !(max_clip.is_finite()
                    && max_clip > 0.0
                    && (max_clip * base.ln()).is_finite())
                {
                    return Err(Error::InvalidConfig(format!(
                        "softplus max_clip must be finite and > 0, got {max_clip}"
                    )));
                }
            }
            Activation::Relu | Activation::Tanh | Activation::Softmax => {}
        }

        Ok(())
    }

    /// Apply the activation.
    pub fn forward(self, x: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => x.mapv(|v| v.max(0.0)),
            Activation::LeakyRelu { alpha } => x.mapv(|v| if v > 0.0 { v } else { alpha * v }),
            Activation::Tanh => x.mapv(f32::tanh),
            Activation::Sigmoid { zoom } => x.mapv(|v| sigmoid(v / zoom)),
            Activation::SoftPlus { base, max_clip } => {
                let ln_base = base.ln();
                x.mapv(|v| {
                    // max(z, 0) + ln(1 + e^-|z|) stays finite for any clip range.
                    let z = v.clamp(-max_clip, max_clip) * ln_base;
                    (z.max(0.0) + (-z.abs()).exp().ln_1p()) / ln_base
                })
            }
            Activation::Softmax => softmax_rows(x),
        }
    }

    /// Gradient of the loss with respect to the activation input.
    ///
    /// `input` is the tensor previously passed to `forward`; `upstream` is
    /// `dL/d(output)`. Both must have the same shape.
    pub fn backward(self, input: &Array2<f32>, upstream: &Array2<f32>) -> Array2<f32> {
        assert_eq!(
            input.shape(),
            upstream.shape(),
            "activation input shape {:?} does not match upstream gradient shape {:?}",
            input.shape(),
            upstream.shape()
        );

        match self {
            Activation::Relu => Zip::from(input)
                .and(upstream)
                .map_collect(|&x, &g| if x > 0.0 { g } else { 0.0 }),
            Activation::LeakyRelu { alpha } => Zip::from(input)
                .and(upstream)
                .map_collect(|&x, &g| if x > 0.0 { g } else { alpha * g }),
            Activation::Tanh => Zip::from(input).and(upstream).map_collect(|&x, &g| {
                let y = x.tanh();
                g * (1.0 - y * y)
            }),
            Activation::Sigmoid { zoom } => {
                Zip::from(input).and(upstream).map_collect(|&x, &g| {
                    let s = sigmoid(x / zoom);
                    g * s * (1.0 - s) / zoom
                })
            }
            Activation::SoftPlus { base, max_clip } => {
                let ln_base = base.ln();
                Zip::from(input).and(upstream).map_collect(|&x, &g| {
                    let c = x.clamp(-max_clip, max_clip);
                    g * sigmoid(c * ln_base)
                })
            }
            Activation::Softmax => softmax_backward(input, upstream),
        }
    }

    #[inline]
    pub(crate) fn info(self) -> String {
        match self {
            Activation::Relu => "Relu".to_owned(),
            Activation::LeakyRelu { alpha } => format!("LeakyRelu(alpha={alpha})"),
            Activation::Tanh => "Tanh".to_owned(),
            Activation::Sigmoid { zoom } => format!("Sigmoid(zoom={zoom})"),
            Activation::SoftPlus { base, max_clip } => {
                format!("SoftPlus(base={base}, max_clip={max_clip})")
            }
            Activation::Softmax => "Softmax".to_owned(),
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn softmax_rows(x: &Array2<f32>) -> Array2<f32> {
    let mut out = x.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

/// Exact Jacobian-vector product per row:
/// `grad_j = sum_k upstream_k * s_j * (delta_jk - s_k)`.
fn softmax_backward(input: &Array2<f32>, upstream: &Array2<f32>) -> Array2<f32> {
    let s = softmax_rows(input);
    let mut grad = Array2::zeros(input.raw_dim());

    for ((s_row, up_row), mut g_row) in s
        .axis_iter(Axis(0))
        .zip(upstream.axis_iter(Axis(0)))
        .zip(grad.axis_iter_mut(Axis(0)))
    {
        let k = s_row.len();
        for j in 0..k {
            let mut acc = 0.0_f32;
            for i in 0..k {
                let delta = if i == j { 1.0 } else { 0.0 };
                acc += up_row[i] * s_row[j] * (delta - s_row[i]);
            }
            g_row[j] = acc;
        }
    }

    grad
}
