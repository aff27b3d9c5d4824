use optimizers::{ParamTree, Result, Sgd};
use serde::{Deserialize, Serialize};

use crate::{LOG_LR, LearnedOptimizer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnableSgdConfig {
    pub initial_lr: f32,
}

impl Default for LearnableSgdConfig {
    fn default() -> Self {
        Self { initial_lr: 0.01 }
    }
}

/// SGD with a learnable log learning rate.
#[derive(Debug, Clone)]
pub struct LearnableSgd {
    config: LearnableSgdConfig,
}

impl LearnableSgd {
    pub fn new(config: LearnableSgdConfig) -> Self {
        Self { config }
    }

    pub fn with_initial_lr(initial_lr: f32) -> Self {
        Self::new(LearnableSgdConfig { initial_lr })
    }
}

impl LearnedOptimizer for LearnableSgd {
    type Opt = Sgd;

    fn init(&self, _seed: u64) -> ParamTree {
        ParamTree::new().with_leaf(LOG_LR, vec![self.config.initial_lr.ln()])
    }

    fn opt_fn(&self, theta: &ParamTree) -> Result<Self::Opt> {
        let log_lr = theta.scalar(LOG_LR)?;
        Ok(Sgd::with_learning_rate(log_lr.exp()))
    }

    fn name(&self) -> &'static str {
        "learnable_sgd"
    }
}
