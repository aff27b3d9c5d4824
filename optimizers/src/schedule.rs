use serde::{Deserialize, Serialize};

use crate::error::{OptErr, Result};

/// A function of the step count, usually a learning rate multiplier.
pub trait Schedule {
    fn value(&self, x: f32) -> f32;
}

/// Linear interpolation between `(time, value)` breakpoints, constant outside of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewiseLinear {
    times: Vec<f32>,
    values: Vec<f32>,
}

impl PiecewiseLinear {
    /// Creates a new `PiecewiseLinear` schedule.
    ///
    /// # Arguments
    /// * `times` - Non decreasing breakpoint times.
    /// * `values` - The value of the schedule at each breakpoint.
    ///
    /// # Returns
    /// An error if there are no breakpoints, the lengths differ or `times` decreases.
    pub fn new(times: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        if times.is_empty() {
            return Err(OptErr::InvalidSchedule("at least one breakpoint is required"));
        }

        if times.len() != values.len() {
            return Err(OptErr::InvalidSchedule(
                "times and values must have the same length",
            ));
        }

        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(OptErr::InvalidSchedule("times must be non decreasing"));
        }

        Ok(Self { times, values })
    }
}

impl Schedule for PiecewiseLinear {
    fn value(&self, x: f32) -> f32 {
        let Self { times, values } = self;
        let last = times.len() - 1;

        if last == 0 || x <= times[0] {
            return values[0];
        }

        if x >= times[last] {
            return values[last];
        }

        // Bracket index: amount of breakpoints strictly before `x`, minus one.
        let i = times.iter().filter(|&&t| t < x).count() - 1;
        let (x1, x2) = (times[i], times[i + 1]);
        let (y1, y2) = (values[i], values[i + 1]);

        if x == x2 {
            return y2;
        }

        let slope = (y2 - y1) / (x2 - x1);
        y1 + (x - x1) * slope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> PiecewiseLinear {
        PiecewiseLinear::new(vec![0., 10., 20.], vec![1., 3., 0.]).unwrap()
    }

    #[test]
    fn single_breakpoint_is_constant() {
        let s = PiecewiseLinear::new(vec![5.], vec![0.3]).unwrap();

        for x in [-100., 0., 5., 1e6] {
            assert_eq!(s.value(x), 0.3);
        }
    }

    #[test]
    fn clamps_outside_breakpoints() {
        let s = schedule();
        assert_eq!(s.value(-5.), 1.);
        assert_eq!(s.value(25.), 0.);
    }

    #[test]
    fn exact_at_breakpoints() {
        let s = schedule();
        assert_eq!(s.value(0.), 1.);
        assert_eq!(s.value(10.), 3.);
        assert_eq!(s.value(20.), 0.);
    }

    #[test]
    fn interpolates_between_breakpoints() {
        let s = schedule();
        assert!((s.value(5.) - 2.).abs() < 1e-6);
        assert!((s.value(15.) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn repeated_breakpoint_jumps() {
        let s = PiecewiseLinear::new(vec![0., 10., 10., 20.], vec![0., 1., 5., 5.]).unwrap();
        assert_eq!(s.value(10.), 1.);
        assert_eq!(s.value(15.), 5.);
    }

    #[test]
    fn rejects_invalid_breakpoints() {
        assert!(PiecewiseLinear::new(vec![], vec![]).is_err());
        assert!(PiecewiseLinear::new(vec![0., 1.], vec![1.]).is_err());
        assert!(PiecewiseLinear::new(vec![1., 0.], vec![1., 2.]).is_err());
    }
}
