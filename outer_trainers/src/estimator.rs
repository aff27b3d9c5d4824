use std::fmt;

use optimizers::ParamTree;
use serde::{Deserialize, Serialize};

use crate::{Result, metrics::Metrics};

/// Progress of the outer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuterState {
    pub outer_iteration: u64,
}

/// The snapshot of the meta parameters broadcast to every estimator for a round.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerWeights {
    pub theta: ParamTree,
    pub theta_model_state: Option<ParamTree>,
    pub outer_state: OuterState,
}

impl WorkerWeights {
    pub fn new(theta: ParamTree) -> Self {
        Self {
            theta,
            theta_model_state: None,
            outer_state: OuterState::default(),
        }
    }
}

/// A single gradient estimate of the meta loss with respect to `theta`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientEstimatorOut<S, I> {
    pub loss: f32,
    /// Has the same structure as `theta`.
    pub grad: ParamTree,
    pub unroll_state: S,
    pub unroll_info: Option<I>,
}

/// Estimates gradients of the meta loss while carrying a partial unroll across rounds.
///
/// Implementations never modify their inputs, the advanced unroll state is returned
/// inside the estimate instead.
pub trait GradientEstimator {
    type UnrollState: Clone + fmt::Debug + Send + Sync;
    type UnrollInfo: Clone + fmt::Debug + Send;

    /// Creates the first unroll state of this estimator.
    ///
    /// # Arguments
    /// * `weights` - The current meta parameters and outer state.
    /// * `seed` - The seed of this estimator, independent of every other estimator's.
    fn init_worker_state(&self, weights: &WorkerWeights, seed: u64) -> Result<Self::UnrollState>;

    /// Computes one gradient estimate.
    ///
    /// # Arguments
    /// * `weights` - The current meta parameters and outer state.
    /// * `seed` - The seed of this estimate.
    /// * `unroll_state` - The state left by the previous estimate.
    /// * `with_summary` - Whether to fill in the returned metrics.
    ///
    /// # Returns
    /// The estimate, holding the next unroll state, and its metrics. The metrics may be
    /// empty when `with_summary` is false.
    fn compute_gradient_estimate(
        &self,
        weights: &WorkerWeights,
        seed: u64,
        unroll_state: &Self::UnrollState,
        with_summary: bool,
    ) -> Result<(
        GradientEstimatorOut<Self::UnrollState, Self::UnrollInfo>,
        Metrics,
    )>;
}

impl<E: GradientEstimator + ?Sized> GradientEstimator for Box<E> {
    type UnrollState = E::UnrollState;
    type UnrollInfo = E::UnrollInfo;

    fn init_worker_state(&self, weights: &WorkerWeights, seed: u64) -> Result<Self::UnrollState> {
        (**self).init_worker_state(weights, seed)
    }

    fn compute_gradient_estimate(
        &self,
        weights: &WorkerWeights,
        seed: u64,
        unroll_state: &Self::UnrollState,
        with_summary: bool,
    ) -> Result<(
        GradientEstimatorOut<Self::UnrollState, Self::UnrollInfo>,
        Metrics,
    )> {
        (**self).compute_gradient_estimate(weights, seed, unroll_state, with_summary)
    }
}
