use learned_optimizers::LearnedOptimizer;
use log::debug;
use optimizers::{Optimizer, OptimizerState, ParamTree, UpdateArgs};
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    aggregation::{self, AggregatedGradient, NonFinitePolicy},
    estimator::{OuterState, WorkerWeights},
    metrics::Metrics,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientLearnerConfig {
    pub non_finite: NonFinitePolicy,
    /// Rescales the aggregated gradient down to this global norm when it's exceeded.
    pub meta_grad_clip: Option<f32>,
}

/// The state of the outer loop, the meta optimizer's state over `theta`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientLearnerState<S> {
    pub theta_opt_state: OptimizerState<S>,
}

/// Applies aggregated meta gradients to the parameters of a learned optimizer.
#[derive(Debug, Clone)]
pub struct GradientLearner<L, O> {
    lopt: L,
    theta_opt: O,
    config: GradientLearnerConfig,
}

impl<L, O> GradientLearner<L, O>
where
    L: LearnedOptimizer,
    O: Optimizer,
{
    /// Creates a new `GradientLearner`.
    ///
    /// # Arguments
    /// * `lopt` - The learned optimizer being meta trained.
    /// * `theta_opt` - The optimizer applied to the learned optimizer's parameters.
    pub fn new(lopt: L, theta_opt: O) -> Self {
        Self::with_config(lopt, theta_opt, GradientLearnerConfig::default())
    }

    pub fn with_config(lopt: L, theta_opt: O, config: GradientLearnerConfig) -> Self {
        Self {
            lopt,
            theta_opt,
            config,
        }
    }

    pub fn lopt(&self) -> &L {
        &self.lopt
    }

    pub fn config(&self) -> &GradientLearnerConfig {
        &self.config
    }

    /// Initializes `theta` and the meta optimizer over it, at outer iteration `0`.
    pub fn init(&self, seed: u64) -> GradientLearnerState<O::InnerState> {
        let theta = self.lopt.init(seed);
        let theta_opt_state = self.theta_opt.init(theta, None, None, Some(seed));
        GradientLearnerState { theta_opt_state }
    }

    /// Moves the outer loop one iteration forward.
    ///
    /// # Arguments
    /// * `state` - The current state, left untouched.
    /// * `grads` - The gradients gathered during this round.
    ///
    /// # Returns
    /// The state at the next outer iteration and the metrics of the round, or an
    /// error if the gradients can't be aggregated or applied to `theta`.
    pub fn update(
        &self,
        state: &GradientLearnerState<O::InnerState>,
        grads: &[AggregatedGradient],
    ) -> Result<(GradientLearnerState<O::InnerState>, Metrics)> {
        let policy = self.config.non_finite;
        let agg = aggregation::aggregate(grads, policy)?;
        let num_dropped = grads
            .iter()
            .filter(|g| !policy.keeps(g.mean_loss, &g.theta_grads))
            .count();

        let grad_norm = agg.theta_grads.global_norm();
        let theta_grads = match self.config.meta_grad_clip {
            Some(max_norm) if grad_norm > max_norm => {
                agg.theta_grads.scale(max_norm / grad_norm)
            }
            _ => agg.theta_grads,
        };

        let args = UpdateArgs {
            loss: Some(agg.mean_loss),
            model_state: agg.theta_model_state,
            is_valid: true,
            seed: None,
        };

        let theta_opt_state = self
            .theta_opt
            .update(&state.theta_opt_state, &theta_grads, args)?;

        let outer_iteration = theta_opt_state.iteration;
        debug!(
            outer_iteration = outer_iteration,
            mean_loss = agg.mean_loss,
            grad_norm = grad_norm;
            "applied meta gradient"
        );

        let metrics = Metrics::from([
            ("mean_loss".to_string(), agg.mean_loss),
            ("theta_grad_norm".to_string(), grad_norm),
            ("num_gradients".to_string(), (grads.len() - num_dropped) as f32),
            ("num_dropped".to_string(), num_dropped as f32),
            ("outer_iteration".to_string(), outer_iteration as f32),
        ]);

        Ok((GradientLearnerState { theta_opt_state }, metrics))
    }

    /// Builds the snapshot broadcast to the gradient estimators.
    pub fn get_state_for_worker(
        &self,
        state: &GradientLearnerState<O::InnerState>,
    ) -> WorkerWeights {
        let (theta, theta_model_state) =
            self.theta_opt.get_params_state(&state.theta_opt_state);

        WorkerWeights {
            theta: theta.clone(),
            theta_model_state: theta_model_state.cloned(),
            outer_state: OuterState {
                outer_iteration: self.outer_iteration(state),
            },
        }
    }

    pub fn get_lopt_params<'a>(
        &self,
        state: &'a GradientLearnerState<O::InnerState>,
    ) -> &'a ParamTree {
        self.theta_opt.get_params(&state.theta_opt_state)
    }

    pub fn outer_iteration(&self, state: &GradientLearnerState<O::InnerState>) -> u64 {
        state.theta_opt_state.iteration
    }
}

#[cfg(test)]
mod tests {
    use learned_optimizers::{LOG_LR, LearnableSgd};
    use optimizers::Sgd;

    use super::*;
    use crate::MetaErr;

    fn grad(value: f32) -> AggregatedGradient {
        AggregatedGradient {
            theta_grads: ParamTree::new().with_leaf(LOG_LR, vec![value]),
            theta_model_state: None,
            mean_loss: 0.,
        }
    }

    #[test]
    fn clipping_bounds_the_step() {
        let config = GradientLearnerConfig {
            meta_grad_clip: Some(0.1),
            ..GradientLearnerConfig::default()
        };
        let learner = GradientLearner::with_config(
            LearnableSgd::with_initial_lr(1.),
            Sgd::with_learning_rate(1.),
            config,
        );

        let state = learner.init(0);
        let (next, metrics) = learner.update(&state, &[grad(10.)]).unwrap();

        let log_lr = learner.get_lopt_params(&next).scalar(LOG_LR).unwrap();
        assert!((log_lr + 0.1).abs() < 1e-6);
        assert_eq!(metrics["theta_grad_norm"], 10.);
    }

    #[test]
    fn worker_weights_follow_iteration() {
        let learner = GradientLearner::new(
            LearnableSgd::with_initial_lr(1.),
            Sgd::with_learning_rate(1.),
        );

        let state = learner.init(0);
        assert_eq!(learner.get_state_for_worker(&state).outer_state.outer_iteration, 0);

        let (next, metrics) = learner.update(&state, &[grad(1.), grad(3.)]).unwrap();
        let weights = learner.get_state_for_worker(&next);

        assert_eq!(weights.outer_state.outer_iteration, 1);
        assert_eq!(weights.theta.scalar(LOG_LR).unwrap(), -2.);
        assert_eq!(metrics["num_gradients"], 2.);
        assert_eq!(metrics["num_dropped"], 0.);
        assert_eq!(metrics["outer_iteration"], 1.);
    }

    #[test]
    fn dropped_gradients_are_not_counted() {
        let learner = GradientLearner::new(
            LearnableSgd::with_initial_lr(1.),
            Sgd::with_learning_rate(1.),
        );
        let state = learner.init(0);

        let grads = [grad(2.), grad(f32::NAN), grad(4.)];
        let (next, metrics) = learner.update(&state, &grads).unwrap();

        assert_eq!(learner.get_lopt_params(&next).scalar(LOG_LR).unwrap(), -3.);
        assert_eq!(metrics["num_gradients"], 2.);
        assert_eq!(metrics["num_dropped"], 1.);
    }

    #[test]
    fn all_non_finite_round_fails_without_moving() {
        let learner = GradientLearner::new(
            LearnableSgd::with_initial_lr(1.),
            Sgd::with_learning_rate(1.),
        );
        let state = learner.init(0);

        let err = learner.update(&state, &[grad(f32::NAN)]).unwrap_err();
        assert_eq!(err, MetaErr::NoValidGradients { dropped: 1 });
        assert_eq!(learner.outer_iteration(&state), 0);
    }
}
