use optimizers::{Adam, AdamConfig, ParamTree, Result};
use serde::{Deserialize, Serialize};

use crate::{LOG_LR, LearnedOptimizer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnableAdamConfig {
    pub initial_lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for LearnableAdamConfig {
    fn default() -> Self {
        let adam = AdamConfig::default();

        Self {
            initial_lr: 1e-3,
            beta1: adam.beta1,
            beta2: adam.beta2,
            epsilon: adam.epsilon,
        }
    }
}

/// Adam with a learnable log learning rate, the moment decays stay fixed.
#[derive(Debug, Clone)]
pub struct LearnableAdam {
    config: LearnableAdamConfig,
}

impl LearnableAdam {
    pub fn new(config: LearnableAdamConfig) -> Self {
        Self { config }
    }
}

impl LearnedOptimizer for LearnableAdam {
    type Opt = Adam;

    fn init(&self, _seed: u64) -> ParamTree {
        ParamTree::new().with_leaf(LOG_LR, vec![self.config.initial_lr.ln()])
    }

    fn opt_fn(&self, theta: &ParamTree) -> Result<Self::Opt> {
        let LearnableAdamConfig {
            beta1,
            beta2,
            epsilon,
            ..
        } = self.config;

        Ok(Adam::new(AdamConfig {
            learning_rate: theta.scalar(LOG_LR)?.exp(),
            beta1,
            beta2,
            epsilon,
            ..AdamConfig::default()
        }))
    }

    fn name(&self) -> &'static str {
        "learnable_adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_rate_round_trips_through_theta() {
        let lopt = LearnableAdam::new(LearnableAdamConfig {
            initial_lr: 0.05,
            ..LearnableAdamConfig::default()
        });

        let opt = lopt.opt_fn(&lopt.init(7)).unwrap();
        assert!((opt.config().learning_rate - 0.05).abs() < 1e-6);
        assert_eq!(opt.config().beta1, 0.9);
    }
}
