use learned_optimizers::LearnedOptimizer;
use log::trace;
use optimizers::{Optimizer, OptimizerState, ParamTree, UpdateArgs};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tasks::{Task, TaskFamily, train_batch};

use crate::{
    MetaErr, Result,
    estimator::{GradientEstimator, GradientEstimatorOut, WorkerWeights},
    metrics::Metrics,
    seeding,
};

type InnerState<L> = <<L as LearnedOptimizer>::Opt as Optimizer>::InnerState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncatedEsConfig {
    /// Inner steps per estimate.
    pub unroll_length: usize,
    /// Inner steps after which the unroll restarts on a new task.
    pub trunc_length: usize,
    /// Standard deviation of the perturbations of `theta`.
    pub std: f32,
}

impl Default for TruncatedEsConfig {
    fn default() -> Self {
        Self {
            unroll_length: 10,
            trunc_length: 100,
            std: 0.01,
        }
    }
}

/// A partial inner training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedUnrollState<C, S> {
    pub task_cfg: C,
    pub inner_opt_state: OptimizerState<S>,
    /// Inner steps taken since the last reset.
    pub step: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncationInfo {
    /// Mean inner loss of the unperturbed unroll.
    pub loss: f32,
    pub step: usize,
    /// Whether the unroll restarted after this estimate.
    pub reset: bool,
}

/// Antithetic evolution strategies over truncated inner unrolls.
///
/// Every estimate perturbs `theta` by `±ε`, unrolls the inner problem from the same
/// starting point with both perturbed optimizers and returns
/// `(L⁺ − L⁻) / (2σ²) · ε`. The unroll is then advanced with the unperturbed `theta`.
#[derive(Debug, Clone)]
pub struct TruncatedEs<F, L> {
    family: F,
    lopt: L,
    config: TruncatedEsConfig,
}

impl<F, L> TruncatedEs<F, L>
where
    F: TaskFamily,
    L: LearnedOptimizer,
{
    /// Creates a new `TruncatedEs` estimator.
    ///
    /// # Arguments
    /// * `family` - The family inner tasks are sampled from.
    /// * `lopt` - The learned optimizer whose `theta` is being estimated.
    /// * `config` - The unroll and perturbation settings.
    ///
    /// # Returns
    /// The estimator or an error if a length is zero or `std` isn't positive.
    pub fn new(family: F, lopt: L, config: TruncatedEsConfig) -> Result<Self> {
        if config.unroll_length == 0 || config.trunc_length == 0 {
            return Err(MetaErr::InvalidConfig("unroll and truncation lengths must be positive"));
        }

        if !(config.std > 0.) {
            return Err(MetaErr::InvalidConfig("the perturbation std must be positive"));
        }

        Ok(Self {
            family,
            lopt,
            config,
        })
    }

    fn fresh_unroll(
        &self,
        theta: &ParamTree,
        seed: u64,
    ) -> Result<TruncatedUnrollState<F::Cfg, InnerState<L>>> {
        let [cfg_seed, init_seed] = seeding::split_n(seed);

        let task_cfg = self.family.sample(cfg_seed);
        let task = self.family.task_fn(&task_cfg);
        let (params, model_state) = task.init(init_seed);

        let opt = self.lopt.opt_fn(theta)?;
        let num_steps = Some(self.config.trunc_length as u64);
        let inner_opt_state = opt.init(params, model_state, num_steps, Some(init_seed));

        Ok(TruncatedUnrollState {
            task_cfg,
            inner_opt_state,
            step: 0,
        })
    }

    /// Trains `task` with `opt` for one step per seed.
    ///
    /// # Returns
    /// The final inner state and the mean loss seen along the way.
    fn unroll(
        &self,
        task: &F::Task,
        opt: &L::Opt,
        start: &OptimizerState<InnerState<L>>,
        seeds: &[u64],
    ) -> Result<(OptimizerState<InnerState<L>>, f32)> {
        let datasets = task.datasets();
        let mut opt_state = start.clone();
        let mut total = 0.;

        for &seed in seeds {
            let batch = train_batch(datasets.as_ref(), seed);
            let (params, model_state) = opt.get_params_state(&opt_state);
            let out = task.loss_and_grad(params, model_state, seed, &batch)?;
            total += out.loss;

            let args = UpdateArgs {
                loss: Some(out.loss),
                model_state: out.model_state,
                is_valid: out.loss.is_finite(),
                seed: Some(seed),
            };

            opt_state = opt.update(&opt_state, &out.grad, args)?;
        }

        Ok((opt_state, total / seeds.len() as f32))
    }
}

impl<F, L> GradientEstimator for TruncatedEs<F, L>
where
    F: TaskFamily,
    L: LearnedOptimizer,
{
    type UnrollState = TruncatedUnrollState<F::Cfg, InnerState<L>>;
    type UnrollInfo = TruncationInfo;

    fn init_worker_state(&self, weights: &WorkerWeights, seed: u64) -> Result<Self::UnrollState> {
        self.fresh_unroll(&weights.theta, seed)
    }

    fn compute_gradient_estimate(
        &self,
        weights: &WorkerWeights,
        seed: u64,
        unroll_state: &Self::UnrollState,
        with_summary: bool,
    ) -> Result<(
        GradientEstimatorOut<Self::UnrollState, Self::UnrollInfo>,
        Metrics,
    )> {
        let TruncatedEsConfig {
            unroll_length,
            trunc_length,
            std,
        } = self.config;
        let [noise_seed, data_seed, reset_seed] = seeding::split_n(seed);

        let mut rng = StdRng::seed_from_u64(noise_seed);
        let theta = &weights.theta;
        let eps = theta.map(|_| std * rng.sample::<f32, _>(StandardNormal));

        // Both halves of the pair and the unperturbed unroll see the same batches.
        let seeds = seeding::split(data_seed, unroll_length);
        let task = self.family.task_fn(&unroll_state.task_cfg);
        let start = &unroll_state.inner_opt_state;

        let pos_opt = self.lopt.opt_fn(&theta.add(&eps)?)?;
        let (_, pos_loss) = self.unroll(&task, &pos_opt, start, &seeds)?;

        let neg_opt = self.lopt.opt_fn(&theta.sub(&eps)?)?;
        let (_, neg_loss) = self.unroll(&task, &neg_opt, start, &seeds)?;

        let opt = self.lopt.opt_fn(theta)?;
        let (inner_opt_state, loss) = self.unroll(&task, &opt, start, &seeds)?;

        let grad = eps.scale((pos_loss - neg_loss) / (2. * std * std));

        let step = unroll_state.step + unroll_length;
        let reset = step >= trunc_length;

        let mut metrics = Metrics::new();
        if with_summary {
            let (params, model_state) = opt.get_params_state(&inner_opt_state);
            let batch = train_batch(task.datasets().as_ref(), data_seed);
            let (_, _, aux) = task.loss_and_aux(params, model_state, data_seed, &batch)?;

            metrics.extend(aux.into_iter().map(|(k, v)| (format!("mean||aux/{k}"), v)));
            metrics.insert("mean||pos_loss".into(), pos_loss);
            metrics.insert("mean||neg_loss".into(), neg_loss);
            metrics.insert("mean||unroll_loss".into(), loss);
            metrics.insert("max||truncation_step".into(), step as f32);
            metrics.insert("sample||reset".into(), if reset { 1. } else { 0. });
        }

        let next = if reset {
            self.fresh_unroll(theta, reset_seed)?
        } else {
            TruncatedUnrollState {
                task_cfg: unroll_state.task_cfg.clone(),
                inner_opt_state,
                step,
            }
        };

        trace!(task = task.name(), step = step, reset = reset; "truncated es estimate");

        let out = GradientEstimatorOut {
            loss: (pos_loss + neg_loss) / 2.,
            grad,
            unroll_state: next,
            unroll_info: Some(TruncationInfo { loss, step, reset }),
        };

        Ok((out, metrics))
    }
}

#[cfg(test)]
mod tests {
    use learned_optimizers::{LOG_LR, LearnableSgd};
    use tasks::{BatchQuadraticTask, QuadraticTask, SingleTaskFamily};

    use super::*;

    fn estimator(
        config: TruncatedEsConfig,
    ) -> TruncatedEs<SingleTaskFamily<QuadraticTask>, LearnableSgd> {
        let family = SingleTaskFamily::new(QuadraticTask::new(vec![1., 1.]), None, None);
        TruncatedEs::new(family, LearnableSgd::with_initial_lr(0.01), config).unwrap()
    }

    #[test]
    fn rejects_degenerate_config() {
        let family = SingleTaskFamily::new(QuadraticTask::new(vec![1.]), None, None);
        let lopt = LearnableSgd::with_initial_lr(0.01);

        let config = TruncatedEsConfig {
            unroll_length: 0,
            ..TruncatedEsConfig::default()
        };
        assert!(TruncatedEs::new(family.clone(), lopt.clone(), config).is_err());

        let config = TruncatedEsConfig {
            std: 0.,
            ..TruncatedEsConfig::default()
        };
        assert!(TruncatedEs::new(family, lopt, config).is_err());
    }

    #[test]
    fn larger_learning_rate_is_better_on_slow_quadratic() {
        let es = estimator(TruncatedEsConfig::default());
        let weights = WorkerWeights::new(es.lopt.init(0));

        let state = es.init_worker_state(&weights, 0).unwrap();
        let (out, _) = es.compute_gradient_estimate(&weights, 1, &state, false).unwrap();

        assert!(out.grad.scalar(LOG_LR).unwrap() < 0.);
        assert!(out.loss.is_finite());
    }

    #[test]
    fn estimate_is_deterministic_and_pure() {
        let es = estimator(TruncatedEsConfig::default());
        let weights = WorkerWeights::new(es.lopt.init(0));

        let state = es.init_worker_state(&weights, 3).unwrap();
        let before = state.clone();

        let (a, _) = es.compute_gradient_estimate(&weights, 4, &state, true).unwrap();
        let (b, _) = es.compute_gradient_estimate(&weights, 4, &state, true).unwrap();

        assert_eq!(a, b);
        assert_eq!(state, before);
        assert_eq!(a.unroll_state.step, 10);
        assert_eq!(a.unroll_state.inner_opt_state.iteration, 10);
    }

    #[test]
    fn unroll_resets_at_truncation() {
        let config = TruncatedEsConfig {
            unroll_length: 5,
            trunc_length: 10,
            ..TruncatedEsConfig::default()
        };
        let es = estimator(config);
        let weights = WorkerWeights::new(es.lopt.init(0));

        let state = es.init_worker_state(&weights, 0).unwrap();
        let (first, _) = es.compute_gradient_estimate(&weights, 1, &state, false).unwrap();
        assert_eq!(first.unroll_state.step, 5);
        assert!(!first.unroll_info.unwrap().reset);

        let (second, metrics) = es
            .compute_gradient_estimate(&weights, 2, &first.unroll_state, true)
            .unwrap();
        assert_eq!(second.unroll_state.step, 0);
        assert_eq!(second.unroll_state.inner_opt_state.iteration, 0);
        assert!(second.unroll_info.unwrap().reset);
        assert_eq!(metrics["sample||reset"], 1.);
    }

    #[test]
    fn summary_carries_task_aux() {
        let task = BatchQuadraticTask::new(vec![1.], vec![2.], 0.).unwrap();
        let family = SingleTaskFamily::new(task, None, None);
        let lopt = LearnableSgd::with_initial_lr(0.01);
        let es = TruncatedEs::new(family, lopt, TruncatedEsConfig::default()).unwrap();
        let weights = WorkerWeights::new(es.lopt.init(0));

        let state = es.init_worker_state(&weights, 0).unwrap();
        let (_, metrics) = es.compute_gradient_estimate(&weights, 1, &state, true).unwrap();
        let distance = metrics["mean||aux/distance"];
        assert!(distance > 0. && distance < 2.);

        let (_, metrics) = es.compute_gradient_estimate(&weights, 1, &state, false).unwrap();
        assert!(metrics.is_empty());
    }
}
