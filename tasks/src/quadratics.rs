use optimizers::{OptErr, ParamTree};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::{
    Result, TaskErr,
    datasets::{Datasets, Split},
    family::TaskFamily,
    task::{Aux, LossAndGrad, Task},
};

/// The name of the only leaf of a quadratic task's parameters.
pub const PARAMS: &str = "params";

fn sample_normal(rng: &mut StdRng, n: usize, std_dev: f32) -> Vec<f32> {
    (0..n)
        .map(|_| std_dev * rng.sample::<f32, _>(StandardNormal))
        .collect()
}

fn leaf<'a>(params: &'a ParamTree, expected: usize) -> Result<&'a [f32]> {
    let x = params
        .get(PARAMS)
        .ok_or_else(|| OptErr::MissingLeaf(PARAMS.to_string()))?;

    if x.len() != expected {
        return Err(OptErr::SizeMismatch {
            leaf: PARAMS.to_string(),
            got: x.len(),
            expected,
        }
        .into());
    }

    Ok(x)
}

/// Minimizes `Σ sᵢ xᵢ²`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticTask {
    scales: Vec<f32>,
}

impl QuadraticTask {
    /// Creates a new `QuadraticTask`.
    ///
    /// # Arguments
    /// * `scales` - The curvature along each dimension.
    pub fn new(scales: Vec<f32>) -> Self {
        Self { scales }
    }

    pub fn dim(&self) -> usize {
        self.scales.len()
    }
}

impl Task for QuadraticTask {
    type Batch = ();

    fn init(&self, seed: u64) -> (ParamTree, Option<ParamTree>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let x = sample_normal(&mut rng, self.dim(), 1.);
        (ParamTree::new().with_leaf(PARAMS, x), None)
    }

    fn loss_and_grad(
        &self,
        params: &ParamTree,
        _model_state: Option<&ParamTree>,
        _seed: u64,
        _batch: &Self::Batch,
    ) -> Result<LossAndGrad> {
        let x = leaf(params, self.dim())?;

        let loss = x.iter().zip(&self.scales).map(|(x, s)| s * x * x).sum();
        let grad = x.iter().zip(&self.scales).map(|(x, s)| 2. * s * x).collect();

        Ok(LossAndGrad {
            loss,
            grad: ParamTree::new().with_leaf(PARAMS, grad),
            model_state: None,
        })
    }

    fn name(&self) -> &str {
        "quadratic"
    }
}

/// The sampled configuration of a quadratic task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCfg {
    pub scales: Vec<f32>,
}

/// Quadratics of a fixed dimension with log uniformly sampled curvatures.
#[derive(Debug, Clone)]
pub struct FixedDimQuadraticFamily {
    dim: usize,
    min_scale: f32,
    max_scale: f32,
}

impl FixedDimQuadraticFamily {
    /// Creates a new `FixedDimQuadraticFamily` with curvatures in `[0.1, 10)`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            min_scale: 0.1,
            max_scale: 10.,
        }
    }

    /// Overrides the range the curvatures are sampled from.
    ///
    /// # Arguments
    /// * `min_scale` - Inclusive lower bound, must be positive.
    /// * `max_scale` - Exclusive upper bound, must be greater than `min_scale`.
    ///
    /// # Returns
    /// The family or an error if the range is invalid.
    pub fn with_scale_range(mut self, min_scale: f32, max_scale: f32) -> Result<Self> {
        if !(min_scale > 0. && max_scale > min_scale) {
            return Err(TaskErr::InvalidConfig(
                "the curvature range must be positive and non empty",
            ));
        }

        self.min_scale = min_scale;
        self.max_scale = max_scale;
        Ok(self)
    }
}

impl TaskFamily for FixedDimQuadraticFamily {
    type Cfg = QuadraticCfg;
    type Task = QuadraticTask;

    fn sample(&self, seed: u64) -> Self::Cfg {
        let mut rng = StdRng::seed_from_u64(seed);
        let (low, high) = (self.min_scale.ln(), self.max_scale.ln());

        let scales = (0..self.dim)
            .map(|_| rng.random_range(low..high).exp())
            .collect();

        QuadraticCfg { scales }
    }

    fn task_fn(&self, cfg: &Self::Cfg) -> Self::Task {
        QuadraticTask::new(cfg.scales.clone())
    }

    fn name(&self) -> &str {
        "fixed_dim_quadratic"
    }
}

/// Minimizes `Σ sᵢ (xᵢ − cᵢ)²` where every batch draws a noisy target `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuadraticTask {
    scales: Vec<f32>,
    center: Vec<f32>,
    noise_std: f32,
}

impl BatchQuadraticTask {
    /// Creates a new `BatchQuadraticTask`.
    ///
    /// # Arguments
    /// * `scales` - The curvature along each dimension.
    /// * `center` - The mean of the targets.
    /// * `noise_std` - The standard deviation of the training targets around `center`.
    ///
    /// # Returns
    /// The task or an error if `scales` and `center` have different lengths.
    pub fn new(scales: Vec<f32>, center: Vec<f32>, noise_std: f32) -> Result<Self> {
        if scales.len() != center.len() {
            return Err(TaskErr::InvalidConfig(
                "scales and center must have the same length",
            ));
        }

        Ok(Self {
            scales,
            center,
            noise_std,
        })
    }
}

impl Task for BatchQuadraticTask {
    type Batch = Vec<f32>;

    fn init(&self, _seed: u64) -> (ParamTree, Option<ParamTree>) {
        let x = vec![0.; self.scales.len()];
        (ParamTree::new().with_leaf(PARAMS, x), None)
    }

    fn loss_and_grad(
        &self,
        params: &ParamTree,
        _model_state: Option<&ParamTree>,
        _seed: u64,
        batch: &Self::Batch,
    ) -> Result<LossAndGrad> {
        let dim = self.scales.len();
        let x = leaf(params, dim)?;

        if batch.len() != dim {
            return Err(TaskErr::InvalidBatch {
                got: batch.len(),
                expected: dim,
            });
        }

        let mut loss = 0.;
        let mut grad = Vec::with_capacity(dim);

        for ((x, c), s) in x.iter().zip(batch).zip(&self.scales) {
            let d = x - c;
            loss += s * d * d;
            grad.push(2. * s * d);
        }

        Ok(LossAndGrad {
            loss,
            grad: ParamTree::new().with_leaf(PARAMS, grad),
            model_state: None,
        })
    }

    /// Reports the euclidean `distance` between the parameters and the batch target.
    fn loss_and_aux(
        &self,
        params: &ParamTree,
        model_state: Option<&ParamTree>,
        seed: u64,
        batch: &Self::Batch,
    ) -> Result<(f32, Option<ParamTree>, Aux)> {
        let (loss, model_state) = self.loss(params, model_state, seed, batch)?;
        let x = leaf(params, self.scales.len())?;

        let distance = x
            .iter()
            .zip(batch)
            .map(|(x, c)| (x - c) * (x - c))
            .sum::<f32>()
            .sqrt();

        let aux = Aux::from([("distance".to_string(), distance)]);
        Ok((loss, model_state, aux))
    }

    fn datasets(&self) -> Option<Datasets<Self::Batch>> {
        let (center, noise_std) = (self.center.clone(), self.noise_std);
        let train = Split::new(move |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let noise = sample_normal(&mut rng, center.len(), noise_std);
            center.iter().zip(noise).map(|(c, n)| c + n).collect::<Vec<f32>>()
        });

        let center = self.center.clone();
        let test = Split::new(move |_| center.clone());

        Some(Datasets { train, test })
    }

    fn name(&self) -> &str {
        "batch_quadratic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_gradient_is_analytic() {
        let task = QuadraticTask::new(vec![1., 2.]);
        let params = ParamTree::new().with_leaf(PARAMS, vec![3., -1.]);

        let out = task.loss_and_grad(&params, None, 0, &()).unwrap();
        assert_eq!(out.loss, 11.);
        assert_eq!(out.grad.get(PARAMS).unwrap(), [6., -4.]);
    }

    #[test]
    fn quadratic_rejects_wrong_dimension() {
        let task = QuadraticTask::new(vec![1., 2.]);
        let params = ParamTree::new().with_leaf(PARAMS, vec![3.]);

        let err = task.loss_and_grad(&params, None, 0, &()).unwrap_err();
        assert!(matches!(err, TaskErr::Opt(e) if e.is_structural()));
    }

    #[test]
    fn family_sampling_is_seeded() {
        let family = FixedDimQuadraticFamily::new(10);

        let a = family.sample(1);
        let b = family.sample(1);
        let c = family.sample(2);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.scales.len(), 10);
        assert!(a.scales.iter().all(|&s| (0.09..10.01).contains(&s)));
    }

    #[test]
    fn family_rejects_bad_range() {
        assert!(FixedDimQuadraticFamily::new(2).with_scale_range(0., 1.).is_err());
        assert!(FixedDimQuadraticFamily::new(2).with_scale_range(2., 1.).is_err());
    }

    #[test]
    fn batch_quadratic_targets_noisy_center() {
        let task = BatchQuadraticTask::new(vec![1.], vec![2.], 0.).unwrap();
        let datasets = task.datasets().unwrap();
        let (params, _) = task.init(0);

        let batch = datasets.train.sample(5);
        assert_eq!(batch, [2.]);

        let out = task.loss_and_grad(&params, None, 0, &batch).unwrap();
        assert_eq!(out.loss, 4.);
        assert_eq!(out.grad.get(PARAMS).unwrap(), [-4.]);

        let err = task.loss_and_grad(&params, None, 0, &vec![]).unwrap_err();
        assert_eq!(err, TaskErr::InvalidBatch { got: 0, expected: 1 });
    }

    #[test]
    fn batch_quadratic_reports_distance_to_target() {
        let task = BatchQuadraticTask::new(vec![1., 1.], vec![3., 4.], 0.).unwrap();
        let (params, _) = task.init(0);

        let (loss, state, aux) = task.loss_and_aux(&params, None, 0, &vec![3., 4.]).unwrap();
        assert_eq!(loss, 25.);
        assert_eq!(state, None);
        assert_eq!(aux["distance"], 5.);
    }

    #[test]
    fn aux_defaults_to_nothing() {
        let task = QuadraticTask::new(vec![1.]);
        let params = ParamTree::new().with_leaf(PARAMS, vec![2.]);

        let (loss, _, aux) = task.loss_and_aux(&params, None, 0, &()).unwrap();
        assert_eq!(loss, 4.);
        assert!(aux.is_empty());
    }
}
