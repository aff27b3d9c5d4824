use learned_optimizers::LearnedOptimizer;
use log::warn;
use optimizers::{Optimizer, ParamTree};

use crate::{
    MetaErr, Result,
    estimator::GradientEstimator,
    gradient_learner::{GradientLearner, GradientLearnerConfig, GradientLearnerState},
    metrics::Metrics,
    seeding,
    worker_compute::gradient_worker_compute,
};

/// The state of a `SingleMachineGradientLearner`.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleMachineState<S, U> {
    pub gradient_learner_state: GradientLearnerState<S>,
    /// One per estimator, in the same order.
    pub unroll_states: Vec<U>,
}

/// Runs the estimators and the learner in the same process, one after the other.
pub struct SingleMachineGradientLearner<L, O, E> {
    learner: GradientLearner<L, O>,
    estimators: Vec<E>,
    parallel: bool,
}

impl<L, O, E> SingleMachineGradientLearner<L, O, E>
where
    L: LearnedOptimizer,
    O: Optimizer,
    E: GradientEstimator + Sync,
{
    /// Creates a new `SingleMachineGradientLearner`.
    ///
    /// # Arguments
    /// * `lopt` - The learned optimizer being meta trained.
    /// * `estimators` - The gradient estimators run every round.
    /// * `theta_opt` - The optimizer applied to the learned optimizer's parameters.
    pub fn new(lopt: L, estimators: Vec<E>, theta_opt: O) -> Self {
        let config = GradientLearnerConfig::default();
        Self::with_config(lopt, estimators, theta_opt, config)
    }

    pub fn with_config(
        lopt: L,
        estimators: Vec<E>,
        theta_opt: O,
        config: GradientLearnerConfig,
    ) -> Self {
        Self {
            learner: GradientLearner::with_config(lopt, theta_opt, config),
            estimators,
            parallel: false,
        }
    }

    /// Runs the estimators on the rayon pool instead of sequentially.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn learner(&self) -> &GradientLearner<L, O> {
        &self.learner
    }

    /// Initializes `theta` and the unroll state of every estimator.
    ///
    /// # Arguments
    /// * `seed` - The seed of the whole run.
    ///
    /// # Returns
    /// The initial state or the error of the first estimator failing to initialize.
    pub fn init(&self, seed: u64) -> Result<SingleMachineState<O::InnerState, E::UnrollState>> {
        let [learner_seed, estimators_seed] = seeding::split_n(seed);

        let gradient_learner_state = self.learner.init(learner_seed);
        let weights = self.learner.get_state_for_worker(&gradient_learner_state);

        let unroll_states = self
            .estimators
            .iter()
            .zip(seeding::split(estimators_seed, self.estimators.len()))
            .map(|(estimator, seed)| estimator.init_worker_state(&weights, seed))
            .collect::<Result<_>>()?;

        Ok(SingleMachineState {
            gradient_learner_state,
            unroll_states,
        })
    }

    /// Runs one round of meta training.
    ///
    /// A round left without any valid gradient is skipped: `theta` stays where it was
    /// and only the unroll states move forward.
    ///
    /// # Arguments
    /// * `state` - The current state, left untouched.
    /// * `seed` - The seed of this round.
    /// * `with_metrics` - Whether to collect the estimators' metrics.
    ///
    /// # Returns
    /// The next state, the mean loss of the round and its metrics.
    pub fn update(
        &self,
        state: &SingleMachineState<O::InnerState, E::UnrollState>,
        seed: u64,
        with_metrics: bool,
    ) -> Result<(SingleMachineState<O::InnerState, E::UnrollState>, f32, Metrics)> {
        let weights = self.learner.get_state_for_worker(&state.gradient_learner_state);

        let out = gradient_worker_compute(
            &weights,
            0,
            &self.estimators,
            &state.unroll_states,
            seed,
            with_metrics,
            self.parallel,
            self.learner.config().non_finite,
        )?;

        let grads = std::slice::from_ref(&out.to_put);
        let (gradient_learner_state, learner_metrics) =
            match self.learner.update(&state.gradient_learner_state, grads) {
                Ok(updated) => updated,
                Err(MetaErr::NoValidGradients { dropped }) => {
                    self.skip_round(&state.gradient_learner_state, dropped)
                }
                Err(e) => return Err(e),
            };

        let mut metrics = out.metrics;
        metrics.extend(learner_metrics);

        let next = SingleMachineState {
            gradient_learner_state,
            unroll_states: out.unroll_states,
        };

        Ok((next, out.to_put.mean_loss, metrics))
    }

    fn skip_round(
        &self,
        state: &GradientLearnerState<O::InnerState>,
        dropped: usize,
    ) -> (GradientLearnerState<O::InnerState>, Metrics) {
        let outer_iteration = self.learner.outer_iteration(state);
        warn!(
            outer_iteration = outer_iteration,
            dropped = dropped;
            "skipping round without valid gradients"
        );

        let metrics = Metrics::from([
            ("num_gradients".to_string(), 0.),
            ("num_dropped".to_string(), dropped as f32),
            ("outer_iteration".to_string(), outer_iteration as f32),
        ]);

        (state.clone(), metrics)
    }

    pub fn get_lopt_params<'a>(
        &self,
        state: &'a SingleMachineState<O::InnerState, E::UnrollState>,
    ) -> &'a ParamTree {
        self.learner.get_lopt_params(&state.gradient_learner_state)
    }
}
