use serde::{Deserialize, Serialize};

use crate::{
    optimizer::TransformOptimizer,
    transform::{Chain, Scale, ScaleByAdam},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub epsilon_root: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            epsilon_root: 1e-8,
        }
    }
}

type AdamTransform = Chain<ScaleByAdam, Scale>;

#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    inner: TransformOptimizer<AdamTransform>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(config: AdamConfig) -> Self {
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            epsilon_root,
        } = config;

        let transform = Chain::new(
            ScaleByAdam::new(beta1, beta2, epsilon, epsilon_root),
            Scale::new(-learning_rate),
        );

        Self {
            config,
            inner: TransformOptimizer::new(transform),
        }
    }

    pub fn with_learning_rate(learning_rate: f32) -> Self {
        Self::new(AdamConfig {
            learning_rate,
            ..AdamConfig::default()
        })
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }
}

delegate_optimizer!(Adam, AdamTransform);
