use anyhow::Result;
use learned_optimizers::{LearnableAdam, LearnableSgd, LearnedOptimizer};
use optimizers::{Adam, Optimizer, PiecewiseLinearAdam, RmsProp, Sgd, Sgdm};
use outer_trainers::{
    GradientLearner, SingleMachineGradientLearner, TruncatedEs, distributed::DistributedConfig,
};
use rand::random;
use tasks::{BatchQuadraticTask, FixedDimQuadraticFamily, SingleTaskFamily, TaskFamily};

use crate::{
    config::{
        EstimatorSpec, ExecutionSpec, LearnedOptimizerSpec, MetaTrainSpec, OptimizerSpec,
        TaskFamilySpec,
    },
    session::{DistributedSession, Session, SingleMachineSession},
};

/// Builds meta training `Session`s given a specification.
pub struct MetaTrainerBuilder;

impl MetaTrainerBuilder {
    /// Creates a new `MetaTrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Session` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification of the run.
    ///
    /// # Returns
    /// A new session or an error if any part of the spec holds invalid values.
    pub fn build(&self, spec: MetaTrainSpec) -> Result<Box<dyn Session>> {
        self.resolve_learned_optimizer(spec)
    }

    /// Resolves the `LearnedOptimizer` for this run.
    fn resolve_learned_optimizer(&self, spec: MetaTrainSpec) -> Result<Box<dyn Session>> {
        match spec.learned_optimizer {
            LearnedOptimizerSpec::LearnableSgd(config) => {
                let lopt = LearnableSgd::new(config);
                self.resolve_theta_optimizer(spec, lopt)
            }
            LearnedOptimizerSpec::LearnableAdam(config) => {
                let lopt = LearnableAdam::new(config);
                self.resolve_theta_optimizer(spec, lopt)
            }
        }
    }

    /// Resolves the `Optimizer` applied to `theta`.
    fn resolve_theta_optimizer<L>(&self, spec: MetaTrainSpec, lopt: L) -> Result<Box<dyn Session>>
    where
        L: LearnedOptimizer + Clone + Send + Sync + 'static,
    {
        match spec.theta_optimizer.clone() {
            OptimizerSpec::Sgd(config) => self.resolve_task_family(spec, lopt, Sgd::new(config)),
            OptimizerSpec::Sgdm(config) => self.resolve_task_family(spec, lopt, Sgdm::new(config)),
            OptimizerSpec::Adam(config) => self.resolve_task_family(spec, lopt, Adam::new(config)),
            OptimizerSpec::RmsProp(config) => {
                self.resolve_task_family(spec, lopt, RmsProp::new(config))
            }
            OptimizerSpec::PiecewiseLinearAdam(config) => {
                let theta_opt = PiecewiseLinearAdam::new(config)?;
                self.resolve_task_family(spec, lopt, theta_opt)
            }
        }
    }

    /// Resolves the `TaskFamily` inner problems are drawn from.
    fn resolve_task_family<L, O>(
        &self,
        spec: MetaTrainSpec,
        lopt: L,
        theta_opt: O,
    ) -> Result<Box<dyn Session>>
    where
        L: LearnedOptimizer + Clone + Send + Sync + 'static,
        O: Optimizer + Send + Sync + 'static,
    {
        match spec.task_family.clone() {
            TaskFamilySpec::FixedDimQuadratic { dim, scale_range } => {
                let mut family = FixedDimQuadraticFamily::new(dim);
                if let Some((min_scale, max_scale)) = scale_range {
                    family = family.with_scale_range(min_scale, max_scale)?;
                }

                self.resolve_estimator(spec, lopt, theta_opt, family)
            }
            TaskFamilySpec::BatchQuadratic {
                scales,
                center,
                noise_std,
            } => {
                let task = BatchQuadraticTask::new(scales, center, noise_std)?;
                let family = SingleTaskFamily::new(task, None, None);
                self.resolve_estimator(spec, lopt, theta_opt, family)
            }
        }
    }

    /// Resolves the `GradientEstimator`s of every worker.
    fn resolve_estimator<L, O, F>(
        &self,
        spec: MetaTrainSpec,
        lopt: L,
        theta_opt: O,
        family: F,
    ) -> Result<Box<dyn Session>>
    where
        L: LearnedOptimizer + Clone + Send + Sync + 'static,
        O: Optimizer + Send + Sync + 'static,
        F: TaskFamily + Clone + Send + Sync + 'static,
    {
        let workers = match spec.execution {
            ExecutionSpec::SingleMachine { .. } => 1,
            ExecutionSpec::Distributed { workers, .. } => workers.get(),
        };
        let per_worker = spec.estimators_per_worker.get();

        match spec.estimator {
            EstimatorSpec::TruncatedEs(config) => {
                let estimators = (0..workers)
                    .map(|_| {
                        (0..per_worker)
                            .map(|_| TruncatedEs::new(family.clone(), lopt.clone(), config))
                            .collect()
                    })
                    .collect::<outer_trainers::Result<Vec<Vec<_>>>>()?;

                Ok(self.terminate_build(spec, lopt, theta_opt, estimators))
            }
        }
    }

    /// Terminates the entire build for this run and finally instanciates the session.
    ///
    /// # Arguments
    /// * `spec` - The specification of the run.
    /// * `lopt` - A resolved learned optimizer.
    /// * `theta_opt` - A resolved optimizer for `theta`.
    /// * `workers` - The resolved estimators of every worker.
    fn terminate_build<L, O, E>(
        &self,
        spec: MetaTrainSpec,
        lopt: L,
        theta_opt: O,
        mut workers: Vec<Vec<E>>,
    ) -> Box<dyn Session>
    where
        L: LearnedOptimizer + Send + Sync + 'static,
        O: Optimizer + Send + Sync + 'static,
        E: outer_trainers::GradientEstimator + Send + Sync + 'static,
    {
        let seed = spec.seed.unwrap_or_else(random);
        let with_metrics = spec.execution.with_metrics();

        match spec.execution {
            ExecutionSpec::SingleMachine { parallel, .. } => {
                let estimators = workers.pop().unwrap_or_default();
                let learner = SingleMachineGradientLearner::with_config(
                    lopt,
                    estimators,
                    theta_opt,
                    spec.learner,
                )
                .parallel(parallel);

                let session = SingleMachineSession::new(learner, spec.num_rounds, seed)
                    .with_metrics(with_metrics);
                Box::new(session)
            }
            ExecutionSpec::Distributed { parallel, .. } => {
                let config = DistributedConfig {
                    policy: spec.execution.round_policy().unwrap_or_default(),
                    num_rounds: spec.num_rounds,
                    seed,
                    with_metrics,
                    parallel,
                };

                let learner = GradientLearner::with_config(lopt, theta_opt, spec.learner);
                Box::new(DistributedSession::new(learner, workers, config))
            }
        }
    }
}

impl Default for MetaTrainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use learned_optimizers::LOG_LR;
    use optimizers::PiecewiseLinearAdamConfig;

    use super::*;

    fn run_spec(execution: &str, task_family: &str) -> MetaTrainSpec {
        let json = format!(
            r#"{{
                "learned_optimizer": {{ "learnable_sgd": {{ "initial_lr": 0.01 }} }},
                "theta_optimizer": {{ "adam": {{ "learning_rate": 0.05 }} }},
                "task_family": {task_family},
                "estimator": {{ "truncated_es": {{ "unroll_length": 4, "trunc_length": 8 }} }},
                "estimators_per_worker": 2,
                "execution": {execution},
                "num_rounds": 3,
                "seed": 5
            }}"#
        );

        serde_json::from_str(&json).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_machine_session_runs() {
        let spec = run_spec(
            r#"{ "single_machine": { "parallel": true } }"#,
            r#"{ "fixed_dim_quadratic": { "dim": 3 } }"#,
        );

        let out = MetaTrainerBuilder::new().build(spec).unwrap().run().await.unwrap();

        assert_eq!(out.rounds.len(), 3);
        assert_eq!(out.rounds[2].outer_iteration, 3);
        assert!(out.theta.scalar(LOG_LR).unwrap().is_finite());
        assert!(!out.rounds[0].metrics.contains_key("mean||pos_loss"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn distributed_session_runs() {
        let task_family = r#"{
            "batch_quadratic": { "scales": [1.0, 2.0], "center": [1.0, -1.0], "noise_std": 0.1 }
        }"#;
        let spec = run_spec(
            r#"{ "distributed": { "workers": 2, "with_metrics": true } }"#,
            task_family,
        );

        let out = MetaTrainerBuilder::new().build(spec).unwrap().run().await.unwrap();

        assert_eq!(out.rounds.len(), 3);
        assert_eq!(out.rounds[0].outer_iteration, 1);
        assert!(out.rounds.iter().all(|r| r.mean_loss.is_finite()));
        assert!(out.rounds[0].metrics.contains_key("mean||pos_loss"));
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let spec = run_spec(
            r#"{ "single_machine": {} }"#,
            r#"{ "batch_quadratic": { "scales": [1.0], "center": [] } }"#,
        );
        assert!(MetaTrainerBuilder::new().build(spec).is_err());

        let mut spec = run_spec(
            r#"{ "single_machine": {} }"#,
            r#"{ "fixed_dim_quadratic": { "dim": 2 } }"#,
        );
        spec.theta_optimizer = OptimizerSpec::PiecewiseLinearAdam(PiecewiseLinearAdamConfig {
            times: vec![2., 1.],
            lrs: vec![1., 1.],
            ..PiecewiseLinearAdamConfig::default()
        });
        assert!(MetaTrainerBuilder::new().build(spec).is_err());
    }
}
