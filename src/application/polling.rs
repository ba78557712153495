//! Swap status polling policy and cancellation

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How often and how long a swap order is polled
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first poll
    pub interval: Duration,
    /// Growth factor applied to the delay after every poll, `1.0` keeps it fixed
    pub multiplier: f64,
    /// Ceiling for the grown delay
    pub max_interval: Duration,
    /// Polls before giving up, the immediate first poll included
    pub max_attempts: u32,
    /// Upper bound of the random delay added to every wait
    pub jitter: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            multiplier: 1.0,
            max_interval: Duration::from_secs(30),
            max_attempts: 150,
            jitter: None,
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_interval: interval,
            max_attempts,
            ..Self::default()
        }
    }

    /// Wait after poll number `attempt` (1-based), before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let delay = self.interval.mul_f64(factor.min(u32::MAX as f64));
        if self.multiplier > 1.0 {
            delay.min(self.max_interval.max(self.interval))
        } else {
            delay
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        match self.jitter {
            Some(jitter) if !jitter.is_zero() => {
                let extra = rand::thread_rng().gen_range(0..=jitter.as_millis() as u64);
                delay + Duration::from_millis(extra)
            }
            _ => delay,
        }
    }
}

/// Shared flag that stops an in-flight status poll
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag: Arc::new(flag) }
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once `cancel` was called on any clone
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_policy_keeps_interval() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(40), Duration::from_secs(2));
        assert_eq!(policy.max_attempts, 150);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = PollPolicy {
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            ..PollPolicy::default()
        };
        assert_eq!(policy.base_delay(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay(2), Duration::from_secs(4));
        assert_eq!(policy.base_delay(3), Duration::from_secs(8));
        assert_eq!(policy.base_delay(4), Duration::from_secs(10));
        assert_eq!(policy.base_delay(200), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = PollPolicy {
            jitter: Some(Duration::from_millis(250)),
            ..PollPolicy::default()
        };
        for attempt in 1..20 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2250));
        }
    }

    #[tokio::test]
    async fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }
}
