//! Parameter trees, gradient transformations and the hand designed optimizers
//! built on top of them.

pub mod error;
pub mod hand_designed;
pub mod optimizer;
pub mod schedule;
pub mod transform;
pub mod tree;

pub use error::{OptErr, Result};
pub use hand_designed::{
    Adam, AdamConfig, PiecewiseLinearAdam, PiecewiseLinearAdamConfig, RmsProp, RmsPropConfig,
    Sgd, SgdConfig, Sgdm, SgdmConfig,
};
pub use optimizer::{Optimizer, OptimizerState, TransformOptimizer, UpdateArgs};
pub use schedule::{PiecewiseLinear, Schedule};
pub use tree::ParamTree;
