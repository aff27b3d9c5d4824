use super::GradientTransformation;
use crate::{error::Result, tree::ParamTree};

#[derive(Debug, Clone, PartialEq)]
pub struct TraceState {
    pub velocity: ParamTree,
}

/// Heavy ball momentum, `v = g + decay * v`.
#[derive(Debug, Clone, Copy)]
pub struct Trace {
    decay: f32,
    nesterov: bool,
}

impl Trace {
    /// Creates a new `Trace` transformation.
    ///
    /// # Arguments
    /// * `decay` - The momentum coefficient.
    /// * `nesterov` - Whether to use the nesterov look ahead on the output.
    pub fn new(decay: f32, nesterov: bool) -> Self {
        Self { decay, nesterov }
    }
}

impl GradientTransformation for Trace {
    type State = TraceState;

    fn init(&self, params: &ParamTree) -> Self::State {
        TraceState {
            velocity: params.zeros_like(),
        }
    }

    fn update(
        &self,
        grad: &ParamTree,
        state: &Self::State,
        _params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)> {
        let mu = self.decay;
        let velocity = grad.zip_map(&state.velocity, |g, v| g + mu * v)?;

        let updates = if self.nesterov {
            grad.zip_map(&velocity, |g, v| g + mu * v)?
        } else {
            velocity.clone()
        };

        Ok((updates, TraceState { velocity }))
    }
}
