//! Bounded busy polling.
//
// Busyness is only visible through a status register, so waiting is a sleep
// loop. The loop is bounded; exhausting the budget is reported, never raised.

use crate::error::PtzResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{trace, warn};

/// Defines how long and how often to poll a busy flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Total time budget for waiting.
    pub timeout: Duration,
    /// Delay between consecutive polls.
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(10),
        }
    }
}

impl PollPolicy {
    /// Policy with the given budget and poll period.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Number of sleeps allowed before giving up (`timeout / interval`).
    pub fn max_attempts(&self) -> u32 {
        if self.interval.is_zero() {
            return 0;
        }
        let attempts = self.timeout.as_nanos() / self.interval.as_nanos();
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

/// How a bounded wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe reported free after `attempts` sleeps.
    Ready {
        /// Sleeps taken
        attempts: u32,
    },
    /// The budget ran out with the probe still busy.
    TimedOut {
        /// Sleeps taken
        attempts: u32,
    },
}

impl PollOutcome {
    /// True if the probe reported free.
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    /// Sleeps taken before the wait ended.
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts } | PollOutcome::TimedOut { attempts } => *attempts,
        }
    }
}

/// Anything whose busyness can be sampled with a live transaction.
#[async_trait]
pub trait BusyProbe: Send {
    /// One live status sample.
    async fn is_busy(&mut self) -> PtzResult<bool>;
}

/// Poll `probe` until it reports free or the policy's attempt budget is spent.
///
/// Transport errors from the probe are propagated; a timeout is not an error.
pub async fn wait_while_busy<P: BusyProbe + ?Sized>(
    probe: &mut P,
    policy: &PollPolicy,
) -> PtzResult<PollOutcome> {
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    while probe.is_busy().await? {
        if attempts >= max_attempts {
            warn!(
                attempts,
                timeout_ms = policy.timeout.as_millis() as u64,
                "Device still busy after wait budget, proceeding"
            );
            return Ok(PollOutcome::TimedOut { attempts });
        }
        attempts += 1;
        sleep(policy.interval).await;
    }

    trace!(attempts, "Device free");
    Ok(PollOutcome::Ready { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PtzError;
    use tokio::time::Instant;

    struct CountdownProbe {
        busy_for: u32,
        checks: u32,
    }

    #[async_trait]
    impl BusyProbe for CountdownProbe {
        async fn is_busy(&mut self) -> PtzResult<bool> {
            self.checks += 1;
            if self.busy_for > 0 {
                self.busy_for -= 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    struct BrokenProbe;

    #[async_trait]
    impl BusyProbe for BrokenProbe {
        async fn is_busy(&mut self) -> PtzResult<bool> {
            Err(PtzError::Bus("no ack".into()))
        }
    }

    #[test]
    fn test_default_budget_is_500_attempts() {
        assert_eq!(PollPolicy::default().max_attempts(), 500);
    }

    #[test]
    fn test_zero_interval_has_no_budget() {
        let policy = PollPolicy::new(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(policy.max_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_device_returns_immediately() {
        let mut probe = CountdownProbe { busy_for: 0, checks: 0 };
        let start = Instant::now();
        let outcome = wait_while_busy(&mut probe, &PollPolicy::default())
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Ready { attempts: 0 });
        assert_eq!(probe.checks, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_free() {
        let mut probe = CountdownProbe { busy_for: 7, checks: 0 };
        let start = Instant::now();
        let outcome = wait_while_busy(&mut probe, &PollPolicy::default())
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::Ready { attempts: 7 });
        assert_eq!(probe.checks, 8);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(70) && elapsed < Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_perpetually_busy_times_out_after_budget() {
        let mut probe = CountdownProbe {
            busy_for: u32::MAX,
            checks: 0,
        };
        let start = Instant::now();
        let outcome = wait_while_busy(&mut probe, &PollPolicy::default())
            .await
            .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 500 });
        assert!(!outcome.is_ready());
        assert_eq!(probe.checks, 501);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates() {
        let result = wait_while_busy(&mut BrokenProbe, &PollPolicy::default()).await;
        assert!(matches!(result, Err(PtzError::Bus(_))));
    }
}
