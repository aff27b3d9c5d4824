/// Implements `Optimizer` for a hand designed optimizer by delegating to its
/// inner `TransformOptimizer`.
///
/// # Arguments
/// * `$name` - The optimizer, must hold an `inner: TransformOptimizer<$transform>` field.
/// * `$transform` - The gradient transformation driving the optimizer.
macro_rules! delegate_optimizer {
    ($name:ty, $transform:ty) => {
        impl $crate::optimizer::Optimizer for $name {
            type InnerState = <$transform as $crate::transform::GradientTransformation>::State;

            fn init(
                &self,
                params: $crate::tree::ParamTree,
                model_state: Option<$crate::tree::ParamTree>,
                num_steps: Option<u64>,
                seed: Option<u64>,
            ) -> $crate::optimizer::OptimizerState<Self::InnerState> {
                $crate::optimizer::Optimizer::init(
                    &self.inner,
                    params,
                    model_state,
                    num_steps,
                    seed,
                )
            }

            fn update(
                &self,
                opt_state: &$crate::optimizer::OptimizerState<Self::InnerState>,
                grad: &$crate::tree::ParamTree,
                args: $crate::optimizer::UpdateArgs,
            ) -> $crate::error::Result<$crate::optimizer::OptimizerState<Self::InnerState>> {
                $crate::optimizer::Optimizer::update(&self.inner, opt_state, grad, args)
            }
        }
    };
}

mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod piecewise_linear_adam;
mod rmsprop;

pub use adam::{Adam, AdamConfig};
pub use gradient_descent::{Sgd, SgdConfig};
pub use gradient_descent_with_momentum::{Sgdm, SgdmConfig};
pub use piecewise_linear_adam::{PiecewiseLinearAdam, PiecewiseLinearAdamConfig};
pub use rmsprop::{RmsProp, RmsPropConfig};
