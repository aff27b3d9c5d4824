use super::GradientTransformation;
use crate::{error::Result, schedule::Schedule, tree::ParamTree};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleState {
    pub count: u64,
}

/// Multiplies updates by `schedule(count)`, where `count` is the amount of
/// updates already transformed.
#[derive(Debug, Clone)]
pub struct ScaleBySchedule<S> {
    schedule: S,
}

impl<S: Schedule> ScaleBySchedule<S> {
    pub fn new(schedule: S) -> Self {
        Self { schedule }
    }
}

impl<S: Schedule> GradientTransformation for ScaleBySchedule<S> {
    type State = ScheduleState;

    fn init(&self, _params: &ParamTree) -> Self::State {
        ScheduleState { count: 0 }
    }

    fn update(
        &self,
        grad: &ParamTree,
        state: &Self::State,
        _params: &ParamTree,
    ) -> Result<(ParamTree, Self::State)> {
        let step_size = self.schedule.value(state.count as f32);
        let next = ScheduleState {
            count: state.count + 1,
        };

        Ok((grad.scale(step_size), next))
    }
}
