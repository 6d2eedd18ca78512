use std::time::Duration;

/// Shared back-off policy for upstream calls. The fetcher uses the linear
/// schedule, the enricher the exponential one; both add bounded jitter so
/// retries from concurrent requests don't land in lockstep.
#[derive(Clone, Copy, Debug)]
pub enum Schedule {
    /// `step_ms * attempt` where `attempt` counts from 1.
    Linear { step_ms: u64 },
    /// `min(base_ms << attempt, cap_ms)` where `attempt` counts from 0.
    Exponential { base_ms: u64, cap_ms: u64 },
}

#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    pub schedule: Schedule,
    pub max_jitter_ms: u64,
}

impl Backoff {
    pub const fn feed_fetch() -> Self {
        Backoff {
            schedule: Schedule::Linear { step_ms: 300 },
            max_jitter_ms: 200,
        }
    }

    pub const fn enrichment() -> Self {
        Backoff {
            schedule: Schedule::Exponential {
                base_ms: 1000,
                cap_ms: 8000,
            },
            max_jitter_ms: 200,
        }
    }

    fn base_delay_ms(&self, attempt: u32) -> u64 {
        match self.schedule {
            Schedule::Linear { step_ms } => step_ms * u64::from(attempt.max(1)),
            Schedule::Exponential { base_ms, cap_ms } => base_ms
                .saturating_mul(1u64 << attempt.min(32))
                .min(cap_ms),
        }
    }

    /// Delay to sleep after the given failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::random_range(0..self.max_jitter_ms)
        };
        Duration::from_millis(self.base_delay_ms(attempt) + jitter)
    }
}
