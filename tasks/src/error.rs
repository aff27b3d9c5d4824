use std::{
    error::Error,
    fmt::{self, Display},
};

use optimizers::OptErr;

/// The result type of the tasks crate.
pub type Result<T> = std::result::Result<T, TaskErr>;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskErr {
    Opt(OptErr),
    InvalidBatch { got: usize, expected: usize },
    InvalidConfig(&'static str),
    MissingFamilyDatasets { task: String },
}

impl Display for TaskErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskErr::Opt(e) => write!(f, "{e}"),
            TaskErr::InvalidBatch { got, expected } => {
                write!(f, "invalid batch: got {got} values, expected {expected}")
            }
            TaskErr::InvalidConfig(detail) => write!(f, "invalid task config: {detail}"),
            TaskErr::MissingFamilyDatasets { task } => write!(
                f,
                "task `{task}` has datasets but the family it was sampled from doesn't"
            ),
        }
    }
}

impl Error for TaskErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskErr::Opt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OptErr> for TaskErr {
    fn from(value: OptErr) -> Self {
        Self::Opt(value)
    }
}
