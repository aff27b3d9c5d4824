//! Outer training of learned optimizers: estimating gradients of the meta loss with
//! respect to `theta` and applying them.

pub mod aggregation;
pub mod distributed;
pub mod error;
pub mod estimator;
pub mod gradient_learner;
pub mod metrics;
pub mod seeding;
pub mod single_machine;
pub mod truncated_es;
pub mod worker_compute;

pub use aggregation::{AggregatedGradient, NonFinitePolicy, aggregate};
pub use error::{MetaErr, Result};
pub use estimator::{GradientEstimator, GradientEstimatorOut, OuterState, WorkerWeights};
pub use gradient_learner::{GradientLearner, GradientLearnerConfig, GradientLearnerState};
pub use metrics::Metrics;
pub use single_machine::{SingleMachineGradientLearner, SingleMachineState};
pub use truncated_es::{TruncatedEs, TruncatedEsConfig, TruncatedUnrollState, TruncationInfo};
pub use worker_compute::{GradientWorkerOut, gradient_worker_compute};
