//! Learning-rate schedules.
//!
//! A scheduler is a pure function of the epoch index. It holds no state, so one
//! instance can be shared by every layer of a model (and copied freely between
//! models).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// Maps an epoch index to a learning rate.
pub enum Scheduler {
    /// Fixed learning rate.
    Constant { lr: f32 },
    /// `lr = lr0 / (1 + epoch * drop_rate)`.
    StepDecay { lr0: f32, drop_rate: f32 },
    /// `lr = lr0 * drop_rate^epoch`.
    ExponentialDecay { lr0: f32, drop_rate: f32 },
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::Constant { lr: 1e-2 }
    }
}

impl Scheduler {
    /// Validate scheduler parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Scheduler::Constant { lr } => check_lr(lr),
            Scheduler::StepDecay { lr0, drop_rate } => {
                check_lr(lr0)?;
                if !(drop_rate.is_finite() && drop_rate >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "step decay drop_rate must be finite and >= 0, got {drop_rate}"
                    )));
                }
                Ok(())
            }
            Scheduler::ExponentialDecay { lr0, drop_rate } => {
                check_lr(lr0)?;
                if !(drop_rate.is_finite() && drop_rate > 0.0 && drop_rate <= 1.0) {
                    return Err(Error::InvalidConfig(format!(
                        "exponential decay drop_rate must be finite and in (0,1], got {drop_rate}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Learning rate for `epoch`.
    #[inline]
    pub fn get_learning_rate(self, epoch: usize) -> f32 {
        match self {
            Scheduler::Constant { lr } => lr,
            Scheduler::StepDecay { lr0, drop_rate } => lr0 / (1.0 + epoch as f32 * drop_rate),
            Scheduler::ExponentialDecay { lr0, drop_rate } => {
                // powi takes i32; clamp so very long runs saturate instead of wrapping.
                let e = epoch.min(i32::MAX as usize) as i32;
                lr0 * drop_rate.powi(e)
            }
        }
    }
}

fn check_lr(lr: f32) -> Result<()> {
    if !(lr.is_finite() && lr > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "learning rate must be finite and > 0, got {lr}"
        )));
    }
    Ok(())
}
