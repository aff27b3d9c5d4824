use serde::{Deserialize, Serialize};

use crate::{
    optimizer::TransformOptimizer,
    transform::{Chain, Scale, ScaleByRms, Trace},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsPropConfig {
    pub learning_rate: f32,
    pub decay: f32,
    pub epsilon: f32,
    pub momentum: f32,
    pub nesterov: bool,
}

impl Default for RmsPropConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            decay: 0.9,
            epsilon: 1e-8,
            momentum: 0.,
            nesterov: false,
        }
    }
}

type RmsPropTransform = Chain<Chain<ScaleByRms, Scale>, Trace>;

/// RMSProp, optionally with momentum on the scaled updates.
#[derive(Debug, Clone)]
pub struct RmsProp {
    config: RmsPropConfig,
    inner: TransformOptimizer<RmsPropTransform>,
}

impl RmsProp {
    /// Creates a new `RmsProp` optimizer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `RmsProp` instance.
    pub fn new(config: RmsPropConfig) -> Self {
        let transform = Chain::new(
            Chain::new(
                ScaleByRms::new(config.decay, config.epsilon),
                Scale::new(-config.learning_rate),
            ),
            Trace::new(config.momentum, config.nesterov),
        );

        Self {
            config,
            inner: TransformOptimizer::new(transform),
        }
    }

    pub fn config(&self) -> &RmsPropConfig {
        &self.config
    }
}

delegate_optimizer!(RmsProp, RmsPropTransform);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        optimizer::{Optimizer, UpdateArgs},
        tree::ParamTree,
    };

    #[test]
    fn normalizes_gradient_magnitude() {
        let opt = RmsProp::new(RmsPropConfig {
            learning_rate: 0.1,
            decay: 0.,
            epsilon: 0.,
            ..RmsPropConfig::default()
        });
        let params = ParamTree::new().with_leaf("w", vec![0., 0.]);
        let grad = ParamTree::new().with_leaf("w", vec![100., -0.01]);

        let state = opt.init(params, None, None, None);
        let next = opt.update(&state, &grad, UpdateArgs::default()).unwrap();
        let w = next.params.get("w").unwrap();

        assert!((w[0] + 0.1).abs() < 1e-5);
        assert!((w[1] - 0.1).abs() < 1e-5);
    }
}
