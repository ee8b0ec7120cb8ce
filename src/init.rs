//! Weight initializers.
//!
//! An initializer produces the starting weight matrix `(fan_in, fan_out)` and bias
//! vector `(fan_out,)` of a dense layer. Randomness comes from the RNG handle passed
//! by the caller, so a seeded `StdRng` gives reproducible networks.
//!
//! The bias is drawn from the same distribution as the weights.

use ndarray::{Array, Array1, Array2, Dimension, ShapeBuilder};
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Parameter initialization strategy.
pub enum Initialize {
    Zero,
    One,
    Constant {
        value: f32,
    },
    Uniform {
        min: f32,
        max: f32,
    },
    Normal {
        mean: f32,
        std: f32,
    },
    /// Glorot uniform: `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`.
    #[default]
    XavierUniform,
    /// Glorot normal: `N(0, 2 / (fan_in + fan_out))`.
    XavierNormal,
    /// Kaiming uniform: `U(-a, a)` with `a = sqrt(6 / fan_in)`.
    HeUniform,
    /// Kaiming normal: `N(0, 2 / fan_in)`.
    HeNormal,
}

enum Sampler {
    Fixed(f32),
    Uniform(Uniform<f32>),
    Normal(Normal<f32>),
}

impl Sampler {
    #[inline]
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match self {
            Sampler::Fixed(v) => *v,
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::Normal(d) => d.sample(rng),
        }
    }
}

impl Initialize {
    /// Validate initializer parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Initialize::Constant { value } => {
                if !value.is_finite() {
                    return Err(Error::InvalidConfig(format!(
                        "constant init value must be finite, got {value}"
                    )));
                }
            }
            Initialize::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite() && min <= max && (max - min).is_finite())
                {
                    return Err(Error::InvalidConfig(format!(
                        "uniform init requires finite min <= max with a finite width, got [{min}, {max}]"
                    )));
                }
            }
            Initialize::Normal { mean, std } => {
                if !(mean.is_finite() && std.is_finite() && std >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "normal init requires finite mean and std >= 0, got mean={mean} std={std}"
                    )));
                }
            }
            Initialize::Zero
            | Initialize::One
            | Initialize::XavierUniform
            | Initialize::XavierNormal
            | Initialize::HeUniform
            | Initialize::HeNormal => {}
        }
        Ok(())
    }

    /// Draw a weight matrix with shape `(fan_in, fan_out)`.
    pub fn get_weight<R: Rng + ?Sized>(
        self,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let sampler = self.sampler(fan_in, fan_out)?;
        Ok(fill((fan_in, fan_out), &sampler, rng))
    }

    /// Draw a bias vector with shape `(fan_out,)`.
    pub fn get_bias<R: Rng + ?Sized>(
        self,
        fan_in: usize,
        fan_out: usize,
        rng: &mut R,
    ) -> Result<Array1<f32>> {
        let sampler = self.sampler(fan_in, fan_out)?;
        Ok(fill(fan_out, &sampler, rng))
    }

    fn sampler(self, fan_in: usize, fan_out: usize) -> Result<Sampler> {
        self.validate()?;
        if fan_in == 0 || fan_out == 0 {
            return Err(Error::InvalidConfig(format!(
                "fan_in and fan_out must be > 0, got fan_in={fan_in} fan_out={fan_out}"
            )));
        }

        let fan_in = fan_in as f32;
        let fan_out = fan_out as f32;
        let sampler = match self {
            Initialize::Zero => Sampler::Fixed(0.0),
            Initialize::One => Sampler::Fixed(1.0),
            Initialize::Constant { value } => Sampler::Fixed(value),
            Initialize::Uniform { min, max } => symmetric_or_range(min, max),
            Initialize::Normal { mean, std } => normal(mean, std)?,
            Initialize::XavierUniform => {
                let a = (6.0 / (fan_in + fan_out)).sqrt();
                symmetric_or_range(-a, a)
            }
            Initialize::XavierNormal => normal(0.0, (2.0 / (fan_in + fan_out)).sqrt())?,
            Initialize::HeUniform => {
                let a = (6.0 / fan_in).sqrt();
                symmetric_or_range(-a, a)
            }
            Initialize::HeNormal => normal(0.0, (2.0 / fan_in).sqrt())?,
        };
        Ok(sampler)
    }
}

fn symmetric_or_range(min: f32, max: f32) -> Sampler {
    if min == max {
        Sampler::Fixed(min)
    } else {
        Sampler::Uniform(Uniform::new_inclusive(min, max))
    }
}

fn normal(mean: f32, std: f32) -> Result<Sampler> {
    Normal::new(mean, std)
        .map(Sampler::Normal)
        .map_err(|e| Error::InvalidConfig(format!("invalid normal init: {e}")))
}

fn fill<D, Sh, R>(shape: Sh, sampler: &Sampler, rng: &mut R) -> Array<f32, D>
where
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
    R: Rng + ?Sized,
{
    Array::from_shape_simple_fn(shape, || sampler.draw(rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ALL: [Initialize; 9] = [
        Initialize::Zero,
        Initialize::One,
        Initialize::Constant { value: 0.5 },
        Initialize::Uniform { min: -1.0, max: 2.0 },
        Initialize::Normal { mean: 1.0, std: 0.1 },
        Initialize::XavierUniform,
        Initialize::XavierNormal,
        Initialize::HeUniform,
        Initialize::HeNormal,
    ];

    #[test]
    fn shapes_match_fan_in_and_fan_out() {
        let mut rng = StdRng::seed_from_u64(0);
        for init in ALL {
            let w = init.get_weight(3, 5, &mut rng).unwrap();
            let b = init.get_bias(3, 5, &mut rng).unwrap();
            assert_eq!(w.dim(), (3, 5), "{init:?}");
            assert_eq!(b.len(), 5, "{init:?}");
        }
    }

    #[test]
    fn degenerate_variants_are_exact() {
        let mut rng = StdRng::seed_from_u64(0);
        let z = Initialize::Zero.get_weight(2, 2, &mut rng).unwrap();
        assert!(z.iter().all(|&v| v == 0.0));
        let o = Initialize::One.get_bias(2, 3, &mut rng).unwrap();
        assert!(o.iter().all(|&v| v == 1.0));
        let c = Initialize::Constant { value: -0.25 }
            .get_weight(4, 1, &mut rng)
            .unwrap();
        assert!(c.iter().all(|&v| v == -0.25));
    }

    #[test]
    fn uniform_variants_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let (fan_in, fan_out) = (16, 8);

        let xavier = (6.0_f32 / (fan_in + fan_out) as f32).sqrt();
        let w = Initialize::XavierUniform
            .get_weight(fan_in, fan_out, &mut rng)
            .unwrap();
        assert!(w.iter().all(|&v| v.abs() <= xavier));

        let he = (6.0_f32 / fan_in as f32).sqrt();
        let w = Initialize::HeUniform
            .get_weight(fan_in, fan_out, &mut rng)
            .unwrap();
        assert!(w.iter().all(|&v| v.abs() <= he));

        let w = Initialize::Uniform { min: 2.0, max: 3.0 }
            .get_weight(fan_in, fan_out, &mut rng)
            .unwrap();
        assert!(w.iter().all(|&v| (2.0..=3.0).contains(&v)));
    }

    #[test]
    fn he_normal_has_expected_spread() {
        let mut rng = StdRng::seed_from_u64(2);
        let fan_in = 50;
        let w = Initialize::HeNormal.get_weight(fan_in, 400, &mut rng).unwrap();
        let n = w.len() as f32;
        let mean = w.sum() / n;
        let var = w.mapv(|v| (v - mean) * (v - mean)).sum() / n;
        let expected = 2.0 / fan_in as f32;
        assert!(mean.abs() < 0.01, "mean={mean}");
        assert!((var - expected).abs() / expected < 0.1, "var={var}");
    }

    #[test]
    fn seeded_draws_are_deterministic() {
        let a = Initialize::XavierNormal
            .get_weight(4, 4, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let b = Initialize::XavierNormal
            .get_weight(4, 4, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        assert!(Initialize::Uniform { min: 1.0, max: 0.0 }.validate().is_err());
        assert!(
            Initialize::Normal {
                mean: 0.0,
                std: -1.0
            }
            .validate()
            .is_err()
        );
        assert!(
            Initialize::Constant { value: f32::NAN }
                .validate()
                .is_err()
        );

        let overflowing = Initialize::Uniform {
            min: -f32::MAX,
            max: f32::MAX,
        };
        assert!(overflowing.validate().is_err());

        let mut rng = StdRng::seed_from_u64(0);
        assert!(Initialize::HeNormal.get_weight(0, 3, &mut rng).is_err());
        assert!(overflowing.get_weight(2, 2, &mut rng).is_err());
    }
}
