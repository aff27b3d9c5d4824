//! Optimizers whose hyperparameters are themselves trainable parameters (`theta`).

mod learnable_adam;
mod learnable_sgd;
mod learned_optimizer;

pub use learnable_adam::{LearnableAdam, LearnableAdamConfig};
pub use learnable_sgd::{LearnableSgd, LearnableSgdConfig};
pub use learned_optimizer::LearnedOptimizer;

/// The name of the leaf holding the log learning rate in `theta`.
pub const LOG_LR: &str = "log_lr";
