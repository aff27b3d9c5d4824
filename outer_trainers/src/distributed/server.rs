use learned_optimizers::LearnedOptimizer;
use log::{debug, info, warn};
use optimizers::Optimizer;
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant},
};

use super::{GradientSubmission, RoundPolicy, WorkerLink};
use crate::{
    MetaErr, Result,
    estimator::WorkerWeights,
    gradient_learner::{GradientLearner, GradientLearnerState},
    metrics::{self, Metrics},
};

/// What happened during a closed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    /// The outer iteration the round was computed for.
    pub outer_iteration: u64,
    pub num_gradients: usize,
    pub num_stale: usize,
    pub timed_out: bool,
    pub mean_loss: f32,
    pub metrics: Metrics,
}

/// The central learner, collects gradients from workers and publishes new weights.
pub struct LearnerServer<L, O: Optimizer> {
    learner: GradientLearner<L, O>,
    state: GradientLearnerState<O::InnerState>,
    policy: RoundPolicy,
    weights_tx: watch::Sender<WorkerWeights>,
    grads_tx: Option<mpsc::Sender<GradientSubmission>>,
    grads_rx: mpsc::Receiver<GradientSubmission>,
}

impl<L, O> LearnerServer<L, O>
where
    L: LearnedOptimizer,
    O: Optimizer,
{
    /// Creates a new `LearnerServer`.
    ///
    /// # Arguments
    /// * `learner` - The learner applying the gradients.
    /// * `state` - The state to start from, its weights are published right away.
    /// * `policy` - When rounds close.
    pub fn new(
        learner: GradientLearner<L, O>,
        state: GradientLearnerState<O::InnerState>,
        policy: RoundPolicy,
    ) -> Self {
        let (weights_tx, _) = watch::channel(learner.get_state_for_worker(&state));
        let (grads_tx, grads_rx) = mpsc::channel(policy.gradients_per_round.max(1) * 2);

        Self {
            learner,
            state,
            policy,
            weights_tx,
            grads_tx: Some(grads_tx),
            grads_rx,
        }
    }

    /// Creates the channel ends of a new worker.
    ///
    /// # Returns
    /// The link or `ChannelClosed` once the server started running.
    pub fn link(&self) -> Result<WorkerLink> {
        let grads = self.grads_tx.clone().ok_or(MetaErr::ChannelClosed)?;

        Ok(WorkerLink {
            weights: self.weights_tx.subscribe(),
            grads,
        })
    }

    pub fn state(&self) -> &GradientLearnerState<O::InnerState> {
        &self.state
    }

    pub fn learner(&self) -> &GradientLearner<L, O> {
        &self.learner
    }

    /// Collects gradients until the round closes and applies them.
    ///
    /// Stale gradients are dropped. A round whose gradients are all non finite is
    /// discarded and collection starts over for the same outer iteration.
    ///
    /// # Returns
    /// The report of the round or an error if every worker disconnected or the
    /// gradients couldn't be applied.
    pub async fn run_round(&mut self) -> Result<RoundReport> {
        let outer_iteration = self.learner.outer_iteration(&self.state);

        loop {
            let (grads, num_stale, timed_out) = self.collect(outer_iteration).await?;
            let num_gradients = grads.len();
            let worker_metrics = metrics::merge(grads.iter().map(|s| &s.metrics));
            let grads: Vec<_> = grads.into_iter().map(|s| s.gradient).collect();

            let (state, mut metrics) = match self.learner.update(&self.state, &grads) {
                Ok(out) => out,
                Err(MetaErr::NoValidGradients { dropped }) => {
                    warn!(
                        outer_iteration = outer_iteration,
                        dropped = dropped;
                        "discarding round without valid gradients"
                    );
                    self.publish();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mean_loss = metrics.get("mean_loss").copied().unwrap_or(f32::NAN);
            metrics.extend(worker_metrics);
            self.state = state;
            self.publish();

            info!(
                outer_iteration = outer_iteration,
                gradients = num_gradients,
                stale = num_stale,
                timed_out = timed_out;
                "round closed"
            );

            return Ok(RoundReport {
                outer_iteration,
                num_gradients,
                num_stale,
                timed_out,
                mean_loss,
                metrics,
            });
        }
    }

    /// Broadcasts the weights of the current state, waking every idle worker.
    fn publish(&self) {
        let weights = self.learner.get_state_for_worker(&self.state);
        self.weights_tx.send_replace(weights);
    }

    /// Waits for the fresh gradients of a round.
    ///
    /// # Returns
    /// The fresh submissions, the amount of stale ones dropped and whether the round
    /// closed on timeout.
    async fn collect(&mut self, current: u64) -> Result<(Vec<GradientSubmission>, usize, bool)> {
        let RoundPolicy {
            gradients_per_round,
            round_timeout,
            ..
        } = self.policy;

        let mut fresh = Vec::with_capacity(gradients_per_round);
        let mut num_stale = 0;
        let mut deadline = Instant::now() + round_timeout;

        while fresh.len() < gradients_per_round {
            match time::timeout_at(deadline, self.grads_rx.recv()).await {
                Ok(Some(submission)) => {
                    if self.policy.is_fresh(submission.outer_iteration, current) {
                        fresh.push(submission);
                    } else {
                        debug!(
                            worker_id = submission.worker_id,
                            computed_at = submission.outer_iteration,
                            current = current;
                            "dropping stale gradient"
                        );
                        num_stale += 1;
                    }
                }
                Ok(None) if fresh.is_empty() => return Err(MetaErr::ChannelClosed),
                Ok(None) => return Ok((fresh, num_stale, false)),
                Err(_) if fresh.is_empty() => {
                    warn!(
                        outer_iteration = current;
                        "round timed out without gradients, waiting again"
                    );
                    deadline = Instant::now() + round_timeout;
                }
                Err(_) => return Ok((fresh, num_stale, true)),
            }
        }

        Ok((fresh, num_stale, false))
    }

    /// Runs `num_rounds` rounds.
    ///
    /// Workers are disconnected once this returns, as the weights channel closes.
    ///
    /// # Returns
    /// The final state of the learner and the report of every round.
    pub async fn run(
        mut self,
        num_rounds: usize,
    ) -> Result<(GradientLearnerState<O::InnerState>, Vec<RoundReport>)> {
        self.grads_tx = None;
        let mut reports = Vec::with_capacity(num_rounds);

        for _ in 0..num_rounds {
            reports.push(self.run_round().await?);
        }

        Ok((self.state, reports))
    }
}
