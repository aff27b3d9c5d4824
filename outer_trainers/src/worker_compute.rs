use log::{debug, warn};
use optimizers::ParamTree;
use rayon::prelude::*;

use crate::{
    MetaErr, Result,
    aggregation::{AggregatedGradient, NonFinitePolicy},
    estimator::{GradientEstimator, GradientEstimatorOut, WorkerWeights},
    metrics::{self, Metrics},
    seeding,
};

/// The result of one round of a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientWorkerOut<S, I> {
    pub worker_id: usize,
    /// The gradient to send to the learner.
    pub to_put: AggregatedGradient,
    /// The next unroll state of every estimator, in the same order as the estimators.
    pub unroll_states: Vec<S>,
    pub metrics: Metrics,
    pub unroll_infos: Vec<Option<I>>,
}

/// Runs every estimator of a worker once and averages their estimates.
///
/// Estimates rejected by `policy` are left out of the average, but their estimators
/// still advance. When every estimate is rejected, the average of all of them is
/// returned so the learner drops the whole worker.
///
/// # Arguments
/// * `weights` - The meta parameters of the round.
/// * `worker_id` - The identifier of the calling worker.
/// * `estimators` - The estimators of the worker.
/// * `unroll_states` - The current unroll state of each estimator, index aligned with `estimators`.
/// * `seed` - The seed of the round, every estimator gets its own sub seed.
/// * `with_metrics` - Whether to collect the estimators' metrics.
/// * `parallel` - Whether to run the estimators on the rayon pool.
/// * `policy` - How non finite estimates are treated.
///
/// # Returns
/// The mean loss and gradient of the estimators along with their next unroll states, or
/// an error if the lengths don't match, an estimator fails or the gradients don't share
/// the same structure.
#[allow(clippy::too_many_arguments)]
pub fn gradient_worker_compute<E>(
    weights: &WorkerWeights,
    worker_id: usize,
    estimators: &[E],
    unroll_states: &[E::UnrollState],
    seed: u64,
    with_metrics: bool,
    parallel: bool,
    policy: NonFinitePolicy,
) -> Result<GradientWorkerOut<E::UnrollState, E::UnrollInfo>>
where
    E: GradientEstimator + Sync,
{
    if estimators.len() != unroll_states.len() {
        return Err(MetaErr::LengthMismatch {
            estimators: estimators.len(),
            unroll_states: unroll_states.len(),
        });
    }

    let seeds = seeding::split(seed, estimators.len());
    let estimate = |i: usize| {
        estimators[i].compute_gradient_estimate(
            weights,
            seeds[i],
            &unroll_states[i],
            with_metrics,
        )
    };

    let estimates: Vec<(GradientEstimatorOut<_, _>, Metrics)> = if parallel {
        (0..estimators.len())
            .into_par_iter()
            .map(estimate)
            .collect::<Result<_>>()?
    } else {
        (0..estimators.len()).map(estimate).collect::<Result<_>>()?
    };

    debug!(
        worker_id = worker_id,
        estimators = estimates.len(),
        outer_iteration = weights.outer_state.outer_iteration;
        "computed gradient estimates"
    );

    let outs: Vec<_> = estimates.iter().map(|(out, _)| out).collect();
    let kept: Vec<_> = outs
        .iter()
        .copied()
        .filter(|out| policy.keeps(out.loss, &out.grad))
        .collect();
    let num_dropped = outs.len() - kept.len();

    if num_dropped > 0 {
        warn!(
            worker_id = worker_id,
            dropped = num_dropped,
            total = outs.len();
            "dropping non finite estimates"
        );
    }

    let averaged = if kept.is_empty() { &outs } else { &kept };
    let theta_grads = ParamTree::mean(averaged.iter().map(|out| &out.grad))?;
    let mean_loss = averaged.iter().map(|out| out.loss).sum::<f32>() / averaged.len() as f32;

    let metrics = if with_metrics {
        let mut metrics = metrics::merge(estimates.iter().map(|(_, m)| m));
        metrics.insert("num_dropped_estimates".to_string(), num_dropped as f32);
        metrics
    } else {
        Metrics::new()
    };

    let (unroll_states, unroll_infos) = estimates
        .into_iter()
        .map(|(out, _)| (out.unroll_state, out.unroll_info))
        .unzip();

    Ok(GradientWorkerOut {
        worker_id,
        to_put: AggregatedGradient {
            theta_grads,
            theta_model_state: weights.theta_model_state.clone(),
            mean_loss,
        },
        unroll_states,
        metrics,
        unroll_infos,
    })
}
