use super::GradientTransformation;
use crate::{error::Result, tree::ParamTree};

/// Multiplies every update by a constant.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    step_size: f32,
}

impl Scale {
    pub fn new(step_size: f32) -> Self {
        Self { step_size }
    }
}

impl GradientTransformation for Scale {
    type State = ();

    fn init(&self, _params: &ParamTree) -> Self::State {}

    fn update(
        &self,
        grad: &ParamTree,
        _state: &Self::State,
        _params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)> {
        Ok((grad.scale(self.step_size), ()))
    }
}
