use super::GradientTransformation;
use crate::{error::Result, tree::ParamTree};

#[derive(Debug, Clone, PartialEq)]
pub struct AdamState {
    pub count: u64,
    pub mu: ParamTree,
    pub nu: ParamTree,
}

/// Rescales updates with bias corrected estimates of the first and second moments.
///
/// The output still has to be scaled by the (negative) learning rate.
#[derive(Debug, Clone, Copy)]
pub struct ScaleByAdam {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    epsilon_root: f32,
}

impl ScaleByAdam {
    /// Creates a new `ScaleByAdam` transformation.
    ///
    /// # Arguments
    /// * `beta1`, `beta2` - Decay rates of the first and second moments.
    /// * `epsilon` - Added to the denominator outside the square root.
    /// * `epsilon_root` - Added to the second moment inside the square root.
    pub fn new(beta1: f32, beta2: f32, epsilon: f32, epsilon_root: f32) -> Self {
        Self {
            beta1,
            beta2,
            epsilon,
            epsilon_root,
        }
    }
}

impl GradientTransformation for ScaleByAdam {
    type State = AdamState;

    fn init(&self, params: &ParamTree) -> Self::State {
        AdamState {
            count: 0,
            mu: params.zeros_like(),
            nu: params.zeros_like(),
        }
    }

    fn update(
        &self,
        grad: &ParamTree,
        state: &Self::State,
        _params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)> {
        let Self {
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            epsilon_root: eps_root,
        } = *self;

        let mu = grad.zip_map(&state.mu, |g, m| b1 * m + (1. - b1) * g)?;
        let nu = grad.zip_map(&state.nu, |g, n| b2 * n + (1. - b2) * g * g)?;
        let count = state.count + 1;

        let bc1 = 1. - b1.powf(count as f32);
        let bc2 = 1. - b2.powf(count as f32);

        let updates = mu.zip_map(&nu, |m, n| (m / bc1) / ((n / bc2 + eps_root).sqrt() + eps))?;
        Ok((updates, AdamState { count, mu, nu }))
    }
}
