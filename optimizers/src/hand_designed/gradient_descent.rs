use serde::{Deserialize, Serialize};

use crate::{
    optimizer::TransformOptimizer,
    transform::Scale,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    pub learning_rate: f32,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
        }
    }
}

/// Plain stochastic gradient descent, `p -= lr * g`.
#[derive(Debug, Clone)]
pub struct Sgd {
    config: SgdConfig,
    inner: TransformOptimizer<Scale>,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(config: SgdConfig) -> Self {
        let inner = TransformOptimizer::new(Scale::new(-config.learning_rate));
        Self { config, inner }
    }

    pub fn with_learning_rate(learning_rate: f32) -> Self {
        Self::new(SgdConfig { learning_rate })
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }
}

delegate_optimizer!(Sgd, Scale);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        optimizer::{Optimizer, UpdateArgs},
        tree::ParamTree,
    };

    #[test]
    fn descends_along_gradient() {
        let sgd = Sgd::with_learning_rate(0.1);
        let params = ParamTree::new().with_leaf("w", vec![1., 2.]);
        let grad = ParamTree::new().with_leaf("w", vec![10., -10.]);

        let state = sgd.init(params, None, None, None);
        let next = sgd.update(&state, &grad, UpdateArgs::default()).unwrap();

        assert_eq!(next.params.get("w").unwrap(), [0., 3.]);
        assert_eq!(next.iteration, 1);
    }

    #[test]
    fn default_learning_rate() {
        assert_eq!(SgdConfig::default().learning_rate, 0.01);
    }
}
