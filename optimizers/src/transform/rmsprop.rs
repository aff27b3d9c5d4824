use super::GradientTransformation;
use crate::{error::Result, tree::ParamTree};

#[derive(Debug, Clone, PartialEq)]
pub struct RmsState {
    pub nu: ParamTree,
}

/// Divides updates by the root of an exponential moving average of squared gradients.
#[derive(Debug, Clone, Copy)]
pub struct ScaleByRms {
    decay: f32,
    epsilon: f32,
}

impl ScaleByRms {
    /// Creates a new `ScaleByRms` transformation.
    ///
    /// # Arguments
    /// * `decay` - Decay rate of the squared gradient average.
    /// * `epsilon` - Added to the average before taking the root.
    pub fn new(decay: f32, epsilon: f32) -> Self {
        Self { decay, epsilon }
    }
}

impl GradientTransformation for ScaleByRms {
    type State = RmsState;

    fn init(&self, params: &ParamTree) -> Self::State {
        RmsState {
            nu: params.zeros_like(),
        }
    }

    fn update(
        &self,
        grad: &ParamTree,
        state: &Self::State,
        _params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)> {
        let Self { decay, epsilon } = *self;

        let nu = grad.zip_map(&state.nu, |g, n| decay * n + (1. - decay) * g * g)?;
        let updates = grad.zip_map(&nu, |g, n| g / (n + epsilon).sqrt())?;
        Ok((updates, RmsState { nu }))
    }
}
