use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    optimizer::TransformOptimizer,
    schedule::PiecewiseLinear,
    transform::{Chain, Scale, ScaleByAdam, ScaleBySchedule},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiecewiseLinearAdamConfig {
    pub times: Vec<f32>,
    pub lrs: Vec<f32>,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub epsilon_root: f32,
}

impl Default for PiecewiseLinearAdamConfig {
    fn default() -> Self {
        Self {
            times: vec![10000., 20000.],
            lrs: vec![1e-4, 1e-5],
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            epsilon_root: 1e-8,
        }
    }
}

type PiecewiseLinearAdamTransform =
    Chain<Chain<ScaleByAdam, ScaleBySchedule<PiecewiseLinear>>, Scale>;

/// Adam whose learning rate follows a piecewise linear function of the iteration.
#[derive(Debug, Clone)]
pub struct PiecewiseLinearAdam {
    config: PiecewiseLinearAdamConfig,
    inner: TransformOptimizer<PiecewiseLinearAdamTransform>,
}

impl PiecewiseLinearAdam {
    /// Creates a new `PiecewiseLinearAdam` optimizer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `PiecewiseLinearAdam` or an error if `times` and `lrs` don't describe
    /// a valid schedule.
    pub fn new(config: PiecewiseLinearAdamConfig) -> Result<Self> {
        let schedule = PiecewiseLinear::new(config.times.clone(), config.lrs.clone())?;

        let adam = ScaleByAdam::new(
            config.beta1,
            config.beta2,
            config.epsilon,
            config.epsilon_root,
        );

        let transform = Chain::new(
            Chain::new(adam, ScaleBySchedule::new(schedule)),
            Scale::new(-1.),
        );

        Ok(Self {
            config,
            inner: TransformOptimizer::new(transform),
        })
    }

    pub fn config(&self) -> &PiecewiseLinearAdamConfig {
        &self.config
    }
}

delegate_optimizer!(PiecewiseLinearAdam, PiecewiseLinearAdamTransform);
