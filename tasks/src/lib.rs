//! Tasks are the inner problems a learned optimizer is meta trained on.

pub mod datasets;
pub mod error;
pub mod family;
pub mod losses;
pub mod quadratics;
pub mod task;
pub mod test_utils;

pub use datasets::{Datasets, Split};
pub use error::{Result, TaskErr};
pub use family::{SingleTaskFamily, TaskFamily};
pub use losses::softmax_cross_entropy;
pub use quadratics::{BatchQuadraticTask, FixedDimQuadraticFamily, QuadraticCfg, QuadraticTask};
pub use task::{Aux, LossAndGrad, Task, train_batch};
