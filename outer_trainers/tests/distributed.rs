mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::FakeGradientEstimator;
use learned_optimizers::{LOG_LR, LearnableSgd};
use optimizers::{ParamTree, Sgd};
use outer_trainers::{
    AggregatedGradient, GradientEstimator, GradientEstimatorOut, GradientLearner, Metrics, Result,
    WorkerWeights,
    distributed::{
        DistributedConfig, GradientSubmission, LearnerServer, RoundPolicy, run_distributed,
    },
};

/// Estimates a NaN gradient on its first call and records the outer iteration and
/// seed of every call.
#[derive(Debug, Clone, Default)]
struct FlakyEstimator {
    seen: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl GradientEstimator for FlakyEstimator {
    type UnrollState = u64;
    type UnrollInfo = ();

    fn init_worker_state(&self, _weights: &WorkerWeights, _seed: u64) -> Result<u64> {
        Ok(0)
    }

    fn compute_gradient_estimate(
        &self,
        weights: &WorkerWeights,
        seed: u64,
        unroll_state: &u64,
        _with_summary: bool,
    ) -> Result<(GradientEstimatorOut<u64, ()>, Metrics)> {
        let outer_iteration = weights.outer_state.outer_iteration;
        self.seen.lock().unwrap().push((outer_iteration, seed));

        let value = if *unroll_state == 0 { f32::NAN } else { 1. };
        let out = GradientEstimatorOut {
            loss: 1.,
            grad: weights.theta.full_like(value),
            unroll_state: unroll_state + 1,
            unroll_info: None,
        };

        Ok((out, Metrics::new()))
    }
}

fn learner() -> GradientLearner<LearnableSgd, Sgd> {
    let lopt = LearnableSgd::with_initial_lr(1.);
    GradientLearner::new(lopt, Sgd::with_learning_rate(3.))
}

fn submission(worker_id: usize, outer_iteration: u64, grad: f32) -> GradientSubmission {
    GradientSubmission {
        worker_id,
        outer_iteration,
        gradient: AggregatedGradient {
            theta_grads: ParamTree::new().with_leaf(LOG_LR, vec![grad]),
            theta_model_state: None,
            mean_loss: 1.,
        },
        metrics: Metrics::new(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_gradients_are_dropped() {
    let learner = learner();
    let state = learner.init(0);
    let policy = RoundPolicy {
        gradients_per_round: 1,
        round_timeout: Duration::from_secs(10),
        max_staleness: 0,
    };
    let mut server = LearnerServer::new(learner, state, policy);
    let link = server.link().unwrap();

    link.grads.send(submission(0, 0, 1.)).await.unwrap();
    let report = server.run_round().await.unwrap();
    assert_eq!(report.outer_iteration, 0);
    assert_eq!(report.num_gradients, 1);

    link.grads.send(submission(1, 0, 100.)).await.unwrap();
    link.grads.send(submission(0, 1, 1.)).await.unwrap();
    let report = server.run_round().await.unwrap();

    assert_eq!(report.outer_iteration, 1);
    assert_eq!(report.num_stale, 1);
    assert_eq!(report.num_gradients, 1);

    let log_lr = server.learner().get_lopt_params(server.state()).scalar(LOG_LR).unwrap();
    assert_eq!(log_lr, -6.);
    assert_eq!(link.weights.borrow().outer_state.outer_iteration, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_closes_partial_round() {
    let learner = learner();
    let state = learner.init(0);
    let policy = RoundPolicy {
        gradients_per_round: 3,
        round_timeout: Duration::from_millis(50),
        max_staleness: 0,
    };
    let mut server = LearnerServer::new(learner, state, policy);
    let link = server.link().unwrap();

    link.grads.send(submission(0, 0, 1.)).await.unwrap();
    let report = server.run_round().await.unwrap();

    assert!(report.timed_out);
    assert_eq!(report.num_gradients, 1);
    assert_eq!(report.mean_loss, 1.);
}

#[tokio::test(flavor = "multi_thread")]
async fn non_finite_round_is_retried() {
    let learner = learner();
    let state = learner.init(0);
    let policy = RoundPolicy {
        gradients_per_round: 1,
        round_timeout: Duration::from_secs(10),
        max_staleness: 0,
    };
    let mut server = LearnerServer::new(learner, state, policy);
    let link = server.link().unwrap();

    link.grads.send(submission(0, 0, f32::NAN)).await.unwrap();
    link.grads.send(submission(0, 0, 1.)).await.unwrap();
    let report = server.run_round().await.unwrap();

    assert_eq!(report.outer_iteration, 0);
    let log_lr = server.learner().get_lopt_params(server.state()).scalar(LOG_LR).unwrap();
    assert_eq!(log_lr, -3.);
}

#[tokio::test(flavor = "multi_thread")]
async fn workers_and_learner_run_rounds() {
    let workers = vec![
        vec![FakeGradientEstimator::new(0.)],
        vec![FakeGradientEstimator::new(1.)],
    ];
    let config = DistributedConfig {
        policy: RoundPolicy {
            gradients_per_round: 2,
            round_timeout: Duration::from_secs(10),
            max_staleness: 0,
        },
        num_rounds: 2,
        seed: 0,
        with_metrics: true,
        parallel: false,
    };

    let learner = learner();
    let out = run_distributed(learner, workers, config).await.unwrap();

    assert_eq!(out.reports.len(), 2);
    assert!(out.reports.iter().all(|r| r.num_gradients == 2 && !r.timed_out));
    assert_eq!(out.reports[1].outer_iteration, 1);
    assert_eq!(out.reports[0].metrics["mean||metric"], 1.);
    assert_eq!(out.state.theta_opt_state.params.scalar(LOG_LR).unwrap(), -3.);
}

#[tokio::test(flavor = "multi_thread")]
async fn discarded_round_is_recomputed_with_a_new_seed() {
    let estimator = FlakyEstimator::default();
    let seen = Arc::clone(&estimator.seen);
    let config = DistributedConfig {
        policy: RoundPolicy {
            gradients_per_round: 1,
            round_timeout: Duration::from_secs(10),
            max_staleness: 0,
        },
        num_rounds: 2,
        seed: 3,
        with_metrics: false,
        parallel: false,
    };

    let out = run_distributed(learner(), vec![vec![estimator]], config)
        .await
        .unwrap();

    assert_eq!(out.reports.len(), 2);
    assert_eq!(out.state.theta_opt_state.params.scalar(LOG_LR).unwrap(), -6.);

    let seen = seen.lock().unwrap();
    let iterations: Vec<_> = seen.iter().take(3).map(|(it, _)| *it).collect();
    assert_eq!(iterations, [0, 0, 1]);
    assert_ne!(seen[0].1, seen[1].1);
    assert_ne!(seen[1].1, seen[2].1);
}
