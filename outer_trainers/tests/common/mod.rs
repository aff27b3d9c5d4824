use optimizers::ParamTree;
use outer_trainers::{GradientEstimator, GradientEstimatorOut, Metrics, Result, WorkerWeights};

/// Returns a constant gradient and counts its calls in the unroll state.
#[derive(Debug, Clone)]
pub struct FakeGradientEstimator {
    pub grad_val: f32,
}

impl FakeGradientEstimator {
    pub fn new(grad_val: f32) -> Self {
        Self { grad_val }
    }
}

impl GradientEstimator for FakeGradientEstimator {
    type UnrollState = u64;
    type UnrollInfo = ();

    fn init_worker_state(&self, _weights: &WorkerWeights, _seed: u64) -> Result<u64> {
        Ok(0)
    }

    fn compute_gradient_estimate(
        &self,
        weights: &WorkerWeights,
        _seed: u64,
        unroll_state: &u64,
        _with_summary: bool,
    ) -> Result<(GradientEstimatorOut<u64, ()>, Metrics)> {
        let out = GradientEstimatorOut {
            loss: 1.,
            grad: weights.theta.full_like(self.grad_val),
            unroll_state: unroll_state + 1,
            unroll_info: None,
        };

        Ok((out, Metrics::from([("mean||metric".to_string(), 1.)])))
    }
}

#[allow(dead_code)]
pub fn theta(value: f32) -> ParamTree {
    ParamTree::new().with_leaf("theta", vec![value])
}
