//! Inverted dropout.
//!
//! During a training forward pass every activation is kept with probability
//! `1 - p` and survivors are scaled by `1 / (1 - p)`, so inference needs no
//! rescaling. The scaled mask is stored and reused by the following `backward`.

use ndarray::Array2;
use rand::Rng;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    /// Scaled keep mask from the latest training forward: `0` or `1 / (1 - p)`.
    mask: Option<Array2<f32>>,
}

impl Dropout {
    /// Create a dropout layer with drop probability `p` in `[0, 1]`.
    ///
    /// `p == 0` is the identity; `p == 1` zeroes every activation.
    pub fn new(p: f32) -> Result<Self> {
        if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
            return Err(Error::InvalidConfig(format!(
                "dropout probability must be in [0, 1], got {p}"
            )));
        }
        Ok(Self { p, mask: None })
    }

    #[inline]
    pub fn p(&self) -> f32 {
        self.p
    }

    /// Training forward pass: draws a fresh mask and applies it.
    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Array2<f32>, rng: &mut R) -> Array2<f32> {
        let mask = if self.p == 0.0 {
            Array2::ones(input.raw_dim())
        } else if self.p >= 1.0 {
            Array2::zeros(input.raw_dim())
        } else {
            let keep = f64::from(1.0 - self.p);
            let scale = 1.0 / (1.0 - self.p);
            Array2::from_shape_simple_fn(input.raw_dim(), || {
                if rng.gen_bool(keep) { scale } else { 0.0 }
            })
        };

        let output = input * &mask;
        self.mask = Some(mask);
        output
    }

    /// Apply the mask from the latest forward pass to `upstream`.
    ///
    /// Returns `Error::InvalidState` if no training forward has run yet.
    pub fn backward(&self, upstream: &Array2<f32>) -> Result<Array2<f32>> {
        let mask = self.mask.as_ref().ok_or_else(|| {
            Error::InvalidState("dropout backward called before any forward pass".to_owned())
        })?;
        assert_eq!(
            mask.shape(),
            upstream.shape(),
            "upstream gradient shape {:?} does not match dropout mask shape {:?}",
            upstream.shape(),
            mask.shape()
        );
        Ok(upstream * mask)
    }

    /// Same drop probability, no stored mask.
    pub fn copy(&self) -> Self {
        Self {
            p: self.p,
            mask: None,
        }
    }
}
