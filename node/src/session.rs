use learned_optimizers::LearnedOptimizer;
use log::{info, warn};
use optimizers::{Optimizer, ParamTree};
use outer_trainers::{
    GradientEstimator, GradientLearner, MetaErr, Metrics, Result, SingleMachineGradientLearner,
    SingleMachineState,
    distributed::{self, DistributedConfig},
    seeding,
};

/// The loss and metrics of a finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub outer_iteration: u64,
    pub mean_loss: f32,
    pub metrics: Metrics,
}

/// The outcome of a meta training run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOut {
    pub theta: ParamTree,
    pub rounds: Vec<RoundSummary>,
}

/// This trait acts as an indirection layer, allowing the `MetaTrainerBuilder` to return
/// every combination of learned optimizer, task family and execution from a single
/// build method.
#[async_trait::async_trait]
pub trait Session: Send {
    /// Runs meta training to completion.
    async fn run(self: Box<Self>) -> Result<SessionOut>;
}

/// Runs every round in this process.
pub struct SingleMachineSession<L, O, E> {
    learner: SingleMachineGradientLearner<L, O, E>,
    num_rounds: usize,
    seed: u64,
    with_metrics: bool,
}

impl<L, O, E> SingleMachineSession<L, O, E>
where
    L: LearnedOptimizer,
    O: Optimizer,
    E: GradientEstimator + Sync,
{
    pub fn new(
        learner: SingleMachineGradientLearner<L, O, E>,
        num_rounds: usize,
        seed: u64,
    ) -> Self {
        Self {
            learner,
            num_rounds,
            seed,
            with_metrics: false,
        }
    }

    pub fn with_metrics(mut self, with_metrics: bool) -> Self {
        self.with_metrics = with_metrics;
        self
    }

    fn outer_iteration(&self, state: &SingleMachineState<O::InnerState, E::UnrollState>) -> u64 {
        self.learner
            .learner()
            .outer_iteration(&state.gradient_learner_state)
    }

    fn run_blocking(&self) -> Result<SessionOut> {
        let [init_seed, rounds_seed] = seeding::split_n(self.seed);
        let mut state = self.learner.init(init_seed)?;
        let mut rounds = Vec::with_capacity(self.num_rounds);

        for round in 0..self.num_rounds {
            let seed = seeding::fold_in(rounds_seed, round as u64);
            let previous = self.outer_iteration(&state);
            let (next, mean_loss, metrics) = self.learner.update(&state, seed, self.with_metrics)?;
            state = next;

            let outer_iteration = self.outer_iteration(&state);
            if outer_iteration == previous {
                warn!(round = round, outer_iteration = outer_iteration; "round skipped");
                continue;
            }

            info!(outer_iteration = outer_iteration, mean_loss = mean_loss; "round finished");
            rounds.push(RoundSummary {
                outer_iteration,
                mean_loss,
                metrics,
            });
        }

        Ok(SessionOut {
            theta: self.learner.get_lopt_params(&state).clone(),
            rounds,
        })
    }
}

#[async_trait::async_trait]
impl<L, O, E> Session for SingleMachineSession<L, O, E>
where
    L: LearnedOptimizer + Send + Sync + 'static,
    O: Optimizer + Send + Sync + 'static,
    E: GradientEstimator + Send + Sync + 'static,
{
    async fn run(self: Box<Self>) -> Result<SessionOut> {
        tokio::task::spawn_blocking(move || self.run_blocking())
            .await
            .map_err(|e| MetaErr::Join(e.to_string()))?
    }
}

/// Runs a learner and one tokio task per worker.
pub struct DistributedSession<L, O, E> {
    learner: GradientLearner<L, O>,
    workers: Vec<Vec<E>>,
    config: DistributedConfig,
}

impl<L, O, E> DistributedSession<L, O, E> {
    pub fn new(
        learner: GradientLearner<L, O>,
        workers: Vec<Vec<E>>,
        config: DistributedConfig,
    ) -> Self {
        Self {
            learner,
            workers,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<L, O, E> Session for DistributedSession<L, O, E>
where
    L: LearnedOptimizer + Send + Sync + 'static,
    O: Optimizer + Send + Sync + 'static,
    E: GradientEstimator + Send + Sync + 'static,
{
    async fn run(self: Box<Self>) -> Result<SessionOut> {
        let Self {
            learner,
            workers,
            config,
        } = *self;

        let out = distributed::run_distributed(learner, workers, config).await?;
        let rounds = out
            .reports
            .iter()
            .map(|report| RoundSummary {
                outer_iteration: report.outer_iteration + 1,
                mean_loss: report.mean_loss,
                metrics: report.metrics.clone(),
            })
            .collect();

        Ok(SessionOut {
            theta: out.state.theta_opt_state.params,
            rounds,
        })
    }
}
