use std::{
    error::Error,
    fmt::{self, Display},
};

use optimizers::OptErr;
use tasks::TaskErr;

/// The result type of the outer trainers crate.
pub type Result<T> = std::result::Result<T, MetaErr>;

/// Meta training failures.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaErr {
    Opt(OptErr),
    Task(TaskErr),
    LengthMismatch {
        estimators: usize,
        unroll_states: usize,
    },
    NoValidGradients {
        dropped: usize,
    },
    InvalidConfig(&'static str),
    ChannelClosed,
    Join(String),
}

impl Display for MetaErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaErr::Opt(e) => write!(f, "{e}"),
            MetaErr::Task(e) => write!(f, "{e}"),
            MetaErr::LengthMismatch {
                estimators,
                unroll_states,
            } => write!(
                f,
                "got {unroll_states} unroll states for {estimators} gradient estimators"
            ),
            MetaErr::NoValidGradients { dropped } => write!(
                f,
                "no gradients left to aggregate, {dropped} were dropped for being non finite"
            ),
            MetaErr::InvalidConfig(detail) => write!(f, "invalid configuration: {detail}"),
            MetaErr::ChannelClosed => {
                f.write_str("every worker disconnected before the round closed")
            }
            MetaErr::Join(detail) => write!(f, "worker task failed: {detail}"),
        }
    }
}

impl Error for MetaErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MetaErr::Opt(e) => Some(e),
            MetaErr::Task(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OptErr> for MetaErr {
    fn from(value: OptErr) -> Self {
        Self::Opt(value)
    }
}

impl From<TaskErr> for MetaErr {
    fn from(value: TaskErr) -> Self {
        match value {
            TaskErr::Opt(e) => Self::Opt(e),
            other => Self::Task(other),
        }
    }
}
