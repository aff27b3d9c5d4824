use serde::{Deserialize, Serialize};

use crate::{
    optimizer::TransformOptimizer,
    transform::{Chain, Scale, Trace},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdmConfig {
    pub learning_rate: f32,
    pub momentum: f32,
}

impl Default for SgdmConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            momentum: 0.9,
        }
    }
}

type SgdmTransform = Chain<Trace, Scale>;

/// Stochastic gradient descent with heavy ball momentum.
#[derive(Debug, Clone)]
pub struct Sgdm {
    config: SgdmConfig,
    inner: TransformOptimizer<SgdmTransform>,
}

impl Sgdm {
    /// Creates a new `Sgdm` optimizer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the optimizer.
    ///
    /// # Returns
    /// A new `Sgdm` instance.
    pub fn new(config: SgdmConfig) -> Self {
        let transform = Chain::new(
            Trace::new(config.momentum, false),
            Scale::new(-config.learning_rate),
        );

        Self {
            config,
            inner: TransformOptimizer::new(transform),
        }
    }

    pub fn config(&self) -> &SgdmConfig {
        &self.config
    }
}

delegate_optimizer!(Sgdm, SgdmTransform);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        optimizer::{Optimizer, UpdateArgs},
        tree::ParamTree,
    };

    #[test]
    fn momentum_accumulates() {
        let sgdm = Sgdm::new(SgdmConfig {
            learning_rate: 1.,
            momentum: 0.5,
        });
        let params = ParamTree::new().with_leaf("w", vec![0.]);
        let grad = ParamTree::new().with_leaf("w", vec![1.]);

        let state = sgdm.init(params, None, None, None);
        let state = sgdm.update(&state, &grad, UpdateArgs::default()).unwrap();
        assert_eq!(state.params.get("w").unwrap(), [-1.]);

        let state = sgdm.update(&state, &grad, UpdateArgs::default()).unwrap();
        assert_eq!(state.params.get("w").unwrap(), [-2.5]);
        assert_eq!(state.iteration, 2);
    }
}
