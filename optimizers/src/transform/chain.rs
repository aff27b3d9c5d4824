use super::GradientTransformation;
use crate::{error::Result, tree::ParamTree};

/// Feeds the updates of `first` into `second`.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> GradientTransformation for Chain<A, B>
where
    A: GradientTransformation,
    B: GradientTransformation,
{
    type State = (A::State, B::State);

    fn init(&self, params: &ParamTree) -> Self::State {
        (self.first.init(params), self.second.init(params))
    }

    fn update(
        &self,
        grad: &ParamTree,
        state: &Self::State,
        params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)> {
        let (updates, first) = self.first.update(grad, &state.0, params)?;
        let (updates, second) = self.second.update(&updates, &state.1, params)?;
        Ok((updates, (first, second)))
    }
}
