use std::fmt;

use crate::{error::Result, tree::ParamTree};

/// A pure rule mapping a gradient into a parameter update.
///
/// Implementors never mutate their inputs, `update` returns the next state instead.
pub trait GradientTransformation {
    type State: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Creates the initial state for a given set of parameters.
    ///
    /// # Arguments
    /// * `params` - The parameters the transformation will be applied to.
    fn init(&self, params: &ParamTree) -> Self::State;

    /// Transforms a gradient into an update.
    ///
    /// # Arguments
    /// * `grad` - The incoming gradient (or the updates of a previous transformation).
    /// * `state` - The current state of the transformation.
    /// * `params` - The current parameters.
    ///
    /// # Returns
    /// The updates and the next state, or a structural error if `grad` doesn't
    /// match the structure of the state.
    fn update(
        &self,
        grad: &ParamTree,
        state: &Self::State,
        params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)>;
}

/// Adds `updates` to `params`.
///
/// # Arguments
/// * `params` - The current parameters.
/// * `updates` - The output of a `GradientTransformation`.
///
/// # Returns
/// The new parameters or a structural error.
pub fn apply_updates(params: &ParamTree, updates: &ParamTree) -> Result<ParamTree> {
    params.add(updates)
}
