use std::time::Duration;

/// When the learner stops waiting for gradients and moves to the next outer iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundPolicy {
    /// Fresh gradients that close a round as soon as they arrive.
    pub gradients_per_round: usize,
    /// How long to wait before closing a round with whatever arrived so far.
    pub round_timeout: Duration,
    /// How many outer iterations behind a gradient may be computed and still be used.
    pub max_staleness: u64,
}

impl Default for RoundPolicy {
    fn default() -> Self {
        Self {
            gradients_per_round: 1,
            round_timeout: Duration::from_secs(30),
            max_staleness: 0,
        }
    }
}

impl RoundPolicy {
    /// Whether a gradient computed at `computed_at` can be used at `current`.
    pub fn is_fresh(&self, computed_at: u64, current: u64) -> bool {
        computed_at <= current && current - computed_at <= self.max_staleness
    }
}
