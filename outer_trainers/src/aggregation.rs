use log::warn;
use optimizers::ParamTree;
use serde::{Deserialize, Serialize};

use crate::{MetaErr, Result};

/// A gradient of the meta loss ready to be applied to `theta`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedGradient {
    pub theta_grads: ParamTree,
    pub theta_model_state: Option<ParamTree>,
    pub mean_loss: f32,
}

/// What to do with gradients or losses holding NaN or infinite values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Leave them out of the aggregation.
    #[default]
    Drop,
    /// Aggregate them as any other gradient.
    Propagate,
}

impl NonFinitePolicy {
    /// Whether a loss and its gradient take part in an average under this policy.
    pub fn keeps(self, loss: f32, grad: &ParamTree) -> bool {
        match self {
            NonFinitePolicy::Drop => loss.is_finite() && grad.is_finite(),
            NonFinitePolicy::Propagate => true,
        }
    }
}

/// Averages a set of gradients into one.
///
/// Every gradient weighs the same. The model state is taken from the first gradient
/// carrying one.
///
/// # Arguments
/// * `grads` - The gradients to combine, they must share the same structure.
/// * `policy` - How non finite gradients are treated.
///
/// # Returns
/// The combined gradient, `NoValidGradients` if none is left after applying `policy`
/// or a structural error.
pub fn aggregate(
    grads: &[AggregatedGradient],
    policy: NonFinitePolicy,
) -> Result<AggregatedGradient> {
    let kept: Vec<_> = grads
        .iter()
        .filter(|g| policy.keeps(g.mean_loss, &g.theta_grads))
        .collect();
    let dropped = grads.len() - kept.len();

    if dropped > 0 {
        warn!(dropped = dropped, total = grads.len(); "dropping non finite gradients");
    }

    if kept.is_empty() {
        return Err(MetaErr::NoValidGradients { dropped });
    }

    let mean_loss = kept.iter().map(|g| g.mean_loss).sum::<f32>() / kept.len() as f32;
    let theta_grads = ParamTree::mean(kept.iter().map(|g| &g.theta_grads))?;
    let theta_model_state = kept.iter().find_map(|g| g.theta_model_state.clone());

    Ok(AggregatedGradient {
        theta_grads,
        theta_model_state,
        mean_loss,
    })
}
