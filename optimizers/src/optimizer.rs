use std::fmt;

use crate::{
    error::Result,
    transform::{GradientTransformation, apply_updates},
    tree::ParamTree,
};

/// The full state of an optimizer at a given iteration.
///
/// States are values: `Optimizer::update` builds a new one and leaves the
/// previous state untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerState<S> {
    pub params: ParamTree,
    pub model_state: Option<ParamTree>,
    pub inner_opt_state: S,
    pub iteration: u64,
}

/// Optional arguments of `Optimizer::update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    /// The loss at the current parameters.
    pub loss: Option<f32>,
    /// The model state to carry into the next optimizer state.
    pub model_state: Option<ParamTree>,
    /// Set by callers that already know the step is valid, hand designed
    /// optimizers ignore it.
    pub is_valid: bool,
    pub seed: Option<u64>,
}

impl UpdateArgs {
    pub fn with_loss(loss: f32) -> Self {
        Self {
            loss: Some(loss),
            ..Self::default()
        }
    }
}

/// Maps the current state and a gradient into the next state.
pub trait Optimizer {
    type InnerState: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Creates the state at iteration `0`.
    ///
    /// # Arguments
    /// * `params` - The initial parameters.
    /// * `model_state` - Auxiliary state of the model, if any.
    /// * `num_steps` - The amount of steps the optimizer is expected to run for.
    /// * `seed` - A seed for optimizers with stochastic initialization.
    fn init(
        &self,
        params: ParamTree,
        model_state: Option<ParamTree>,
        num_steps: Option<u64>,
        seed: Option<u64>,
    ) -> OptimizerState<Self::InnerState>;

    /// Computes the next state.
    ///
    /// # Arguments
    /// * `opt_state` - The current state.
    /// * `grad` - The gradient with respect to `opt_state.params`.
    /// * `args` - The optional arguments of the update.
    ///
    /// # Returns
    /// The state at the next iteration or a structural error if `grad` doesn't
    /// match the parameters.
    fn update(
        &self,
        opt_state: &OptimizerState<Self::InnerState>,
        grad: &ParamTree,
        args: UpdateArgs,
    ) -> Result<OptimizerState<Self::InnerState>>;

    fn get_params<'a>(&self, state: &'a OptimizerState<Self::InnerState>) -> &'a ParamTree {
        &state.params
    }

    fn get_state<'a>(
        &self,
        state: &'a OptimizerState<Self::InnerState>,
    ) -> Option<&'a ParamTree> {
        state.model_state.as_ref()
    }

    fn get_params_state<'a>(
        &self,
        state: &'a OptimizerState<Self::InnerState>,
    ) -> (&'a ParamTree, Option<&'a ParamTree>) {
        (self.get_params(state), self.get_state(state))
    }

    /// Returns a copy of `state` holding `params` instead.
    fn set_params(
        &self,
        state: &OptimizerState<Self::InnerState>,
        params: ParamTree,
    ) -> OptimizerState<Self::InnerState> {
        OptimizerState {
            params,
            ..state.clone()
        }
    }
}

/// An `Optimizer` driven by a `GradientTransformation`.
#[derive(Debug, Clone)]
pub struct TransformOptimizer<T> {
    transform: T,
}

impl<T: GradientTransformation> TransformOptimizer<T> {
    pub fn new(transform: T) -> Self {
        Self { transform }
    }
}

impl<T: GradientTransformation> Optimizer for TransformOptimizer<T> {
    type InnerState = T::State;

    fn init(
        &self,
        params: ParamTree,
        model_state: Option<ParamTree>,
        _num_steps: Option<u64>,
        _seed: Option<u64>,
    ) -> OptimizerState<Self::InnerState> {
        OptimizerState {
            inner_opt_state: self.transform.init(&params),
            params,
            model_state,
            iteration: 0,
        }
    }

    fn update(
        &self,
        opt_state: &OptimizerState<Self::InnerState>,
        grad: &ParamTree,
        args: UpdateArgs,
    ) -> Result<OptimizerState<Self::InnerState>> {
        opt_state.params.check_compatible(grad)?;

        let (updates, inner_opt_state) =
            self.transform
                .update(grad, &opt_state.inner_opt_state, &opt_state.params)?;

        Ok(OptimizerState {
            params: apply_updates(&opt_state.params, &updates)?,
            model_state: args.model_state,
            inner_opt_state,
            iteration: opt_state.iteration + 1,
        })
    }
}
