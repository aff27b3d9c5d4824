use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the optimizers crate.
pub type Result<T> = std::result::Result<T, OptErr>;

/// Errors raised while building or applying an optimizer.
///
/// Structural errors (`StructureMismatch`, `SizeMismatch`) mean a gradient or update
/// tree doesn't have the same shape as the parameters it targets, they are contract
/// violations and should be propagated as is.
#[derive(Debug, Clone, PartialEq)]
pub enum OptErr {
    StructureMismatch {
        leaf: String,
    },
    SizeMismatch {
        leaf: String,
        got: usize,
        expected: usize,
    },
    MissingLeaf(String),
    EmptyMean,
    InvalidSchedule(&'static str),
}

impl OptErr {
    /// Whether this error comes from two trees not sharing the same structure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            OptErr::StructureMismatch { .. } | OptErr::SizeMismatch { .. }
        )
    }
}

impl Display for OptErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptErr::StructureMismatch { leaf } => {
                write!(f, "tree structure mismatch: leaf `{leaf}` is not present in both trees")
            }
            OptErr::SizeMismatch {
                leaf,
                got,
                expected,
            } => write!(
                f,
                "tree structure mismatch at leaf `{leaf}`: got {got} values, expected {expected}"
            ),
            OptErr::MissingLeaf(leaf) => write!(f, "missing leaf `{leaf}`"),
            OptErr::EmptyMean => f.write_str("can't take the mean of zero trees"),
            OptErr::InvalidSchedule(detail) => write!(f, "invalid schedule: {detail}"),
        }
    }
}

impl Error for OptErr {}
