use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

use learned_optimizers::{LearnableAdamConfig, LearnableSgdConfig};
use optimizers::{AdamConfig, PiecewiseLinearAdamConfig, RmsPropConfig, SgdConfig, SgdmConfig};
use outer_trainers::{GradientLearnerConfig, TruncatedEsConfig, distributed::RoundPolicy};
use serde::{Deserialize, Serialize};

/// The specification for the `Optimizer` applied to `theta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd(SgdConfig),
    Sgdm(SgdmConfig),
    Adam(AdamConfig),
    RmsProp(RmsPropConfig),
    PiecewiseLinearAdam(PiecewiseLinearAdamConfig),
}

/// The specification for the `LearnedOptimizer` being meta trained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnedOptimizerSpec {
    LearnableSgd(LearnableSgdConfig),
    LearnableAdam(LearnableAdamConfig),
}

/// The specification for the `TaskFamily` inner problems are drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFamilySpec {
    FixedDimQuadratic {
        dim: usize,
        #[serde(default)]
        scale_range: Option<(f32, f32)>,
    },
    BatchQuadratic {
        scales: Vec<f32>,
        center: Vec<f32>,
        #[serde(default)]
        noise_std: f32,
    },
}

/// The specification for the `GradientEstimator`s of every worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorSpec {
    TruncatedEs(TruncatedEsConfig),
}

/// Where the estimators run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionSpec {
    SingleMachine {
        #[serde(default)]
        parallel: bool,
        #[serde(default)]
        with_metrics: bool,
    },
    Distributed {
        workers: NonZeroUsize,
        /// Defaults to one gradient per worker.
        #[serde(default)]
        gradients_per_round: Option<usize>,
        #[serde(default = "default_round_timeout_ms")]
        round_timeout_ms: u64,
        #[serde(default)]
        max_staleness: u64,
        #[serde(default)]
        parallel: bool,
        /// Whether round reports carry the estimators' summary metrics.
        #[serde(default)]
        with_metrics: bool,
    },
}

fn default_round_timeout_ms() -> u64 {
    30_000
}

fn default_estimators() -> NonZeroUsize {
    NonZeroUsize::MIN
}

impl ExecutionSpec {
    pub fn with_metrics(&self) -> bool {
        match *self {
            ExecutionSpec::SingleMachine { with_metrics, .. }
            | ExecutionSpec::Distributed { with_metrics, .. } => with_metrics,
        }
    }

    /// The round policy of a distributed execution.
    pub fn round_policy(&self) -> Option<RoundPolicy> {
        let ExecutionSpec::Distributed {
            workers,
            gradients_per_round,
            round_timeout_ms,
            max_staleness,
            ..
        } = *self
        else {
            return None;
        };

        Some(RoundPolicy {
            gradients_per_round: gradients_per_round.unwrap_or(workers.get()),
            round_timeout: Duration::from_millis(round_timeout_ms),
            max_staleness,
        })
    }
}

/// The specification of a whole meta training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaTrainSpec {
    pub learned_optimizer: LearnedOptimizerSpec,
    pub theta_optimizer: OptimizerSpec,
    pub task_family: TaskFamilySpec,
    pub estimator: EstimatorSpec,
    #[serde(default = "default_estimators")]
    pub estimators_per_worker: NonZeroUsize,
    #[serde(default)]
    pub learner: GradientLearnerConfig,
    pub execution: ExecutionSpec,
    pub num_rounds: usize,
    pub seed: Option<u64>,
    /// Where to write the final `theta` as JSON, stdout when missing.
    #[serde(default)]
    pub output: Option<PathBuf>,
}
