use std::sync::Arc;

use log::{debug, info};
use tokio::task::{self, JoinSet};

use super::{GradientSubmission, WorkerLink};
use crate::{
    MetaErr, Result,
    aggregation::NonFinitePolicy,
    estimator::{GradientEstimator, WorkerWeights},
    seeding,
    worker_compute::gradient_worker_compute,
};

/// A worker owning its estimators and their unroll states.
pub struct GradientWorker<E> {
    worker_id: usize,
    estimators: Arc<Vec<E>>,
    seed: u64,
    with_metrics: bool,
    parallel: bool,
    non_finite: NonFinitePolicy,
}

impl<E> GradientWorker<E>
where
    E: GradientEstimator + Send + Sync + 'static,
    E::UnrollState: 'static,
    E::UnrollInfo: 'static,
{
    /// Creates a new `GradientWorker`.
    ///
    /// # Arguments
    /// * `worker_id` - The identifier of the worker, attached to every submission.
    /// * `estimators` - The estimators run every round.
    /// * `seed` - The seed of the worker, rounds derive theirs from it.
    pub fn new(worker_id: usize, estimators: Vec<E>, seed: u64) -> Self {
        Self {
            worker_id,
            estimators: Arc::new(estimators),
            seed,
            with_metrics: false,
            parallel: false,
            non_finite: NonFinitePolicy::default(),
        }
    }

    pub fn with_metrics(mut self, with_metrics: bool) -> Self {
        self.with_metrics = with_metrics;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets how non finite estimates are treated before averaging them.
    pub fn non_finite(mut self, non_finite: NonFinitePolicy) -> Self {
        self.non_finite = non_finite;
        self
    }

    /// The seed of a computation over the weights of `outer_iteration`.
    ///
    /// Weights published again after a discarded round get a new `attempt`, so the
    /// retry doesn't reuse the noise of the rejected one.
    fn round_seed(&self, outer_iteration: u64, attempt: u64) -> u64 {
        seeding::fold_in(seeding::fold_in(self.seed, outer_iteration), attempt)
    }

    fn init_unroll_states(&self, weights: &WorkerWeights) -> Result<Vec<E::UnrollState>> {
        self.estimators
            .iter()
            .zip(seeding::split(self.seed, self.estimators.len()))
            .map(|(estimator, seed)| estimator.init_worker_state(weights, seed))
            .collect()
    }

    /// Computes one gradient per published weights until the learner goes away.
    ///
    /// # Arguments
    /// * `link` - The channel ends connecting this worker to the learner.
    ///
    /// # Returns
    /// The amount of gradients submitted, or the first estimation error.
    pub async fn run(self, link: WorkerLink) -> Result<usize> {
        let WorkerLink {
            mut weights,
            grads,
        } = link;

        let worker_id = self.worker_id;
        let mut unroll_states = None;
        let mut submitted = 0;
        let mut last_iteration = None;
        let mut attempt = 0;

        loop {
            let current = weights.borrow_and_update().clone();
            let outer_iteration = current.outer_state.outer_iteration;
            debug!(worker_id = worker_id, outer_iteration = outer_iteration; "received weights");

            let states = match unroll_states.take() {
                Some(states) => states,
                None => self.init_unroll_states(&current)?,
            };

            attempt = match last_iteration {
                Some(last) if last == outer_iteration => attempt + 1,
                _ => 0,
            };
            last_iteration = Some(outer_iteration);

            let estimators = Arc::clone(&self.estimators);
            let seed = self.round_seed(outer_iteration, attempt);
            let (with_metrics, parallel, non_finite) =
                (self.with_metrics, self.parallel, self.non_finite);

            let out = task::spawn_blocking(move || {
                gradient_worker_compute(
                    &current,
                    worker_id,
                    estimators.as_slice(),
                    &states,
                    seed,
                    with_metrics,
                    parallel,
                    non_finite,
                )
            })
            .await
            .map_err(|e| MetaErr::Join(e.to_string()))??;

            unroll_states = Some(out.unroll_states);

            let submission = GradientSubmission {
                worker_id,
                outer_iteration,
                gradient: out.to_put,
                metrics: out.metrics,
            };

            if grads.send(submission).await.is_err() {
                debug!(worker_id = worker_id; "learner stopped receiving gradients");
                break;
            }

            submitted += 1;

            if weights.changed().await.is_err() {
                break;
            }
        }

        info!(worker_id = worker_id, submitted = submitted; "worker finished");
        Ok(submitted)
    }
}

/// Spawns `worker` into `workers`.
pub fn spawn_worker<E>(
    workers: &mut JoinSet<Result<usize>>,
    worker: GradientWorker<E>,
    link: WorkerLink,
) where
    E: GradientEstimator + Send + Sync + 'static,
    E::UnrollState: 'static,
    E::UnrollInfo: 'static,
{
    workers.spawn(worker.run(link));
}
