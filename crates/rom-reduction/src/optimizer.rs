//! Adaptive first-order optimizer used by the gradient-descent strategy.

use nalgebra::DMatrix;

use crate::error::{ReductionError, ReductionResult};

/// Adadelta hyper-parameters. Defaults follow the common Keras values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdadeltaConfig {
    pub learning_rate: f64,
    /// Decay of the running averages.
    pub rho: f64,
    pub epsilon: f64,
}

impl Default for AdadeltaConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            rho: 0.95,
            epsilon: 1e-7,
        }
    }
}

impl AdadeltaConfig {
    pub fn validate(&self) -> ReductionResult<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ReductionError::InvalidConfig {
                what: format!("learning_rate must be positive, got {}", self.learning_rate),
            });
        }
        if !(0.0..1.0).contains(&self.rho) {
            return Err(ReductionError::InvalidConfig {
                what: format!("rho must lie in [0, 1), got {}", self.rho),
            });
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ReductionError::InvalidConfig {
                what: format!("epsilon must be positive, got {}", self.epsilon),
            });
        }
        Ok(())
    }
}

/// Adadelta state for a single matrix parameter.
///
/// Deterministic: the same gradients always produce the same updates.
#[derive(Clone, Debug)]
pub struct Adadelta {
    config: AdadeltaConfig,
    accum_grad: DMatrix<f64>,
    accum_update: DMatrix<f64>,
}

impl Adadelta {
    pub fn new(config: AdadeltaConfig, rows: usize, cols: usize) -> Self {
        Self {
            config,
            accum_grad: DMatrix::zeros(rows, cols),
            accum_update: DMatrix::zeros(rows, cols),
        }
    }

    /// Apply one update to `param` in place.
    pub fn step(&mut self, param: &mut DMatrix<f64>, grad: &DMatrix<f64>) {
        let AdadeltaConfig {
            learning_rate,
            rho,
            epsilon,
        } = self.config;

        for (((p, g), acc_g), acc_u) in param
            .iter_mut()
            .zip(grad.iter())
            .zip(self.accum_grad.iter_mut())
            .zip(self.accum_update.iter_mut())
        {
            *acc_g = rho * *acc_g + (1.0 - rho) * g * g;
            let update = ((*acc_u + epsilon).sqrt() / (*acc_g + epsilon).sqrt()) * g;
            *acc_u = rho * *acc_u + (1.0 - rho) * update * update;
            *p -= learning_rate * update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descends_on_quadratic() {
        // f(p) = |p|^2, grad = 2p
        let config = AdadeltaConfig {
            learning_rate: 1.0,
            ..Default::default()
        };
        let mut opt = Adadelta::new(config, 2, 1);
        let mut p = DMatrix::from_column_slice(2, 1, &[1.0, -2.0]);
        let start = p.norm();
        for _ in 0..200 {
            let grad = &p * 2.0;
            opt.step(&mut p, &grad);
        }
        assert!(p.norm() < start);
    }

    #[test]
    fn validation() {
        assert!(AdadeltaConfig::default().validate().is_ok());
        assert!(
            AdadeltaConfig {
                rho: 1.0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            AdadeltaConfig {
                learning_rate: 0.0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }
}
