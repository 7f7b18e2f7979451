//! Jittered exponential backoff between AMQP publish attempts.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Default delay before the first retry.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(50);
/// Default upper bound on a single delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(1);
/// Default bound on the time one send may spend retrying.
pub const DEFAULT_BACKOFF_DEADLINE: Duration = Duration::from_secs(10);

const MIN_SLEEP_MS: u64 = 10;

/// Exponential backoff policy for publish retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub deadline: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
            deadline: DEFAULT_BACKOFF_DEADLINE,
        }
    }
}

/// Delays for the retries of a single send.
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    started: Instant,
    rng: StdRng,
}

impl BackoffState {
    /// Start a retry sequence at `now`.
    pub fn new(policy: BackoffPolicy, now: Instant) -> Self {
        Self {
            current: policy.base,
            started: now,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Jittered delay before the next attempt, or `None` once the deadline
    /// has passed or the delay would overrun it.
    pub fn next_sleep(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = now.duration_since(self.started);
        let remaining = self.policy.deadline.checked_sub(elapsed)?;

        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep_ms = match max_ms {
            0 => MIN_SLEEP_MS,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        self.current = self.current.saturating_mul(2).min(self.policy.cap);

        let sleep = Duration::from_millis(sleep_ms);
        (sleep < remaining).then_some(sleep)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn policy(base_ms: u64, cap_ms: u64, deadline_ms: u64) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(base_ms),
            cap: Duration::from_millis(cap_ms),
            deadline: Duration::from_millis(deadline_ms),
        }
    }

    #[rstest]
    fn enforces_minimum_sleep() {
        let now = Instant::now();
        let mut backoff = BackoffState::new(policy(0, 0, 1_000), now);
        let sleep = backoff.next_sleep(now).expect("within deadline");
        assert!(sleep >= Duration::from_millis(MIN_SLEEP_MS));
    }

    #[rstest]
    fn delays_grow_up_to_cap() {
        let now = Instant::now();
        let mut backoff = BackoffState::new(policy(20, 80, 60_000), now);
        for _ in 0..6 {
            let sleep = backoff.next_sleep(now).expect("within deadline");
            assert!(sleep <= Duration::from_millis(80), "sleep {sleep:?} exceeds cap");
        }
        assert_eq!(backoff.current, Duration::from_millis(80));
    }

    #[rstest]
    fn respects_deadline() {
        let now = Instant::now();
        let mut backoff = BackoffState::new(policy(10, 10, 20), now);
        assert!(backoff.next_sleep(now).is_some());
        assert!(backoff.next_sleep(now + Duration::from_millis(25)).is_none());
    }
}
