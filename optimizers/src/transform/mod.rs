mod adam;
mod chain;
mod rmsprop;
mod scale;
mod schedule;
mod trace;
mod transformation;

pub use adam::{AdamState, ScaleByAdam};
pub use chain::Chain;
pub use rmsprop::{RmsState, ScaleByRms};
pub use scale::Scale;
pub use schedule::{ScaleBySchedule, ScheduleState};
pub use trace::{Trace, TraceState};
pub use transformation::{GradientTransformation, apply_updates};
