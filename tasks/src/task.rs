use std::collections::BTreeMap;

use optimizers::ParamTree;

use crate::{Result, datasets::Datasets};

/// Named scalars a task reports about an evaluation besides its loss.
pub type Aux = BTreeMap<String, f32>;

/// The output of a forward and backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LossAndGrad {
    pub loss: f32,
    pub grad: ParamTree,
    pub model_state: Option<ParamTree>,
}

/// A differentiable objective over a set of parameters.
///
/// Gradients are supplied by the task itself, there's no automatic differentiation.
pub trait Task {
    /// Tasks without data use `()`.
    type Batch: Default + Send;

    /// Samples the initial parameters and model state.
    fn init(&self, seed: u64) -> (ParamTree, Option<ParamTree>);

    /// Evaluates the loss and its gradient with respect to `params`.
    ///
    /// # Arguments
    /// * `params` - The parameters to evaluate.
    /// * `model_state` - The auxiliary state of the model.
    /// * `seed` - A seed for stochastic losses.
    /// * `batch` - The batch to evaluate on.
    ///
    /// # Returns
    /// The loss, the gradient and the next model state, or an error if the
    /// parameters or the batch have an unexpected shape.
    fn loss_and_grad(
        &self,
        params: &ParamTree,
        model_state: Option<&ParamTree>,
        seed: u64,
        batch: &Self::Batch,
    ) -> Result<LossAndGrad>;

    fn loss(
        &self,
        params: &ParamTree,
        model_state: Option<&ParamTree>,
        seed: u64,
        batch: &Self::Batch,
    ) -> Result<(f32, Option<ParamTree>)> {
        let out = self.loss_and_grad(params, model_state, seed, batch)?;
        Ok((out.loss, out.model_state))
    }

    /// Evaluates the loss along with auxiliary values about the evaluation.
    ///
    /// # Returns
    /// The loss, the next model state and the auxiliary values, none by default.
    fn loss_and_aux(
        &self,
        params: &ParamTree,
        model_state: Option<&ParamTree>,
        seed: u64,
        batch: &Self::Batch,
    ) -> Result<(f32, Option<ParamTree>, Aux)> {
        let (loss, model_state) = self.loss(params, model_state, seed, batch)?;
        Ok((loss, model_state, Aux::new()))
    }

    fn datasets(&self) -> Option<Datasets<Self::Batch>> {
        None
    }

    /// Maps a loss into a range comparable across tasks.
    fn normalizer(&self, loss: f32) -> f32 {
        loss
    }

    fn name(&self) -> &str;
}

/// Draws a training batch from `task`, or its default batch if it has no data.
///
/// # Arguments
/// * `datasets` - The datasets of the task, if any.
/// * `seed` - The seed of the batch.
pub fn train_batch<B: Default>(datasets: Option<&Datasets<B>>, seed: u64) -> B {
    datasets
        .map(|datasets| datasets.train.sample(seed))
        .unwrap_or_default()
}
