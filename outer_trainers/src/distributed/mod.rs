//! In process distribution of meta training: one learner, many workers, connected
//! through tokio channels.

mod round;
mod server;
mod worker;

use learned_optimizers::LearnedOptimizer;
use log::debug;
use optimizers::Optimizer;
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};

pub use round::RoundPolicy;
pub use server::{LearnerServer, RoundReport};
pub use worker::{GradientWorker, spawn_worker};

use crate::{
    MetaErr, Result,
    aggregation::AggregatedGradient,
    estimator::{GradientEstimator, WorkerWeights},
    gradient_learner::{GradientLearner, GradientLearnerState},
    metrics::Metrics,
    seeding,
};

/// A gradient sent from a worker to the learner.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientSubmission {
    pub worker_id: usize,
    /// The outer iteration of the weights the gradient was computed with.
    pub outer_iteration: u64,
    pub gradient: AggregatedGradient,
    pub metrics: Metrics,
}

/// The worker side of the learner's channels.
#[derive(Debug)]
pub struct WorkerLink {
    pub weights: watch::Receiver<WorkerWeights>,
    pub grads: mpsc::Sender<GradientSubmission>,
}

#[derive(Debug, Clone, Copy)]
pub struct DistributedConfig {
    pub policy: RoundPolicy,
    pub num_rounds: usize,
    pub seed: u64,
    pub with_metrics: bool,
    /// Whether workers run their estimators on the rayon pool.
    pub parallel: bool,
}

#[derive(Debug, Clone)]
pub struct DistributedOut<S> {
    pub state: GradientLearnerState<S>,
    pub reports: Vec<RoundReport>,
}

/// Meta trains with one worker per entry of `workers`, each running its own estimators.
///
/// # Arguments
/// * `learner` - The learner applying the gradients.
/// * `workers` - The estimators of every worker.
/// * `config` - The round policy and run settings.
///
/// # Returns
/// The final learner state and the report of every round, or the first error of the
/// learner or of a worker.
pub async fn run_distributed<L, O, E>(
    learner: GradientLearner<L, O>,
    workers: Vec<Vec<E>>,
    config: DistributedConfig,
) -> Result<DistributedOut<O::InnerState>>
where
    L: LearnedOptimizer,
    O: Optimizer,
    E: GradientEstimator + Send + Sync + 'static,
    E::UnrollState: 'static,
    E::UnrollInfo: 'static,
{
    let [learner_seed, workers_seed] = seeding::split_n(config.seed);
    let non_finite = learner.config().non_finite;

    let state = learner.init(learner_seed);
    let server = LearnerServer::new(learner, state, config.policy);

    let mut join_set = JoinSet::new();
    let seeds = seeding::split(workers_seed, workers.len());

    for (worker_id, (estimators, seed)) in workers.into_iter().zip(seeds).enumerate() {
        let worker = GradientWorker::new(worker_id, estimators, seed)
            .with_metrics(config.with_metrics)
            .parallel(config.parallel)
            .non_finite(non_finite);

        spawn_worker(&mut join_set, worker, server.link()?);
    }

    let learned = server.run(config.num_rounds).await;

    // Workers exit once the server is gone, their first error explains a closed channel.
    let mut worker_err = None;
    while let Some(res) = join_set.join_next().await {
        match res.map_err(|e| MetaErr::Join(e.to_string())).and_then(|r| r) {
            Ok(submitted) => debug!(submitted = submitted; "worker joined"),
            Err(e) => {
                worker_err.get_or_insert(e);
            }
        }
    }

    match (learned, worker_err) {
        (Ok((state, reports)), None) => Ok(DistributedOut { state, reports }),
        (Err(MetaErr::ChannelClosed), Some(e)) | (Ok(_), Some(e)) => Err(e),
        (Err(e), _) => Err(e),
    }
}
