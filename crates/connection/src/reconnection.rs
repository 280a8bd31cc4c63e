//! Reconnection policy with exponential backoff.
//!
//! The driver asks the policy whether to retry after an unexpected close,
//! then arms a one-shot timer that posts [`SocketEvent::ReconnectDue`] back
//! to the driver when it fires.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::transport::SocketEvent;
use crate::types::ReconnectConfig;

/// Decides whether and when to reconnect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Returns `true` if another attempt is allowed after `attempts_so_far`
    /// attempts since the last successful open.
    pub fn should_retry(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.config.max_attempts
    }

    /// Delay before attempt `attempt` (1-based): `base * 2^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.config.base_delay.saturating_mul(1u32 << exp);
        if self.config.jitter {
            with_jitter(delay)
        } else {
            delay
        }
    }
}

/// Applies ±25% jitter.
fn with_jitter(delay: Duration) -> Duration {
    let offset = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as f64
        / 1_000_000_000.0)
        * 2.0
        - 1.0; // [-1.0, 1.0)
    let secs = delay.as_secs_f64();
    Duration::from_secs_f64((secs + secs * 0.25 * offset).max(0.0))
}

/// One-shot reconnect timer. Posts `ReconnectDue` unless cancelled first.
pub(crate) async fn reconnect_timer(
    timer: u64,
    delay: Duration,
    events_tx: mpsc::Sender<SocketEvent>,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            trace!(timer, "reconnect timer cancelled");
        }
        _ = tokio::time::sleep(delay) => {
            let _ = events_tx.send(SocketEvent::ReconnectDue { timer }).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_up_to_the_ceiling() {
        let policy = ReconnectPolicy::new(ReconnectConfig::default());
        for attempts in 0..5 {
            assert!(policy.should_retry(attempts), "attempt {}", attempts + 1);
        }
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn delay_doubles_from_base() {
        let policy = ReconnectPolicy::new(ReconnectConfig {
            base_delay: Duration::from_millis(250),
            ..ReconnectConfig::default()
        });
        let expected = [250, 500, 1000, 2000, 4000];
        for (i, &ms) in expected.iter().enumerate() {
            assert_eq!(policy.delay_for(i as u32 + 1), Duration::from_millis(ms));
        }
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let policy = ReconnectPolicy::new(ReconnectConfig {
            base_delay: Duration::from_secs(u64::MAX / 2),
            ..ReconnectConfig::default()
        });
        assert_eq!(policy.delay_for(40), Duration::MAX);
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = ReconnectPolicy::new(ReconnectConfig {
            jitter: true,
            ..ReconnectConfig::default()
        });
        for attempt in 1..=5 {
            let base = 2f64.powi(attempt as i32 - 1);
            let secs = policy.delay_for(attempt).as_secs_f64();
            assert!(
                secs >= base * 0.74 && secs <= base * 1.26,
                "attempt {attempt}: {secs:.3}s"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let start = tokio::time::Instant::now();
        tokio::spawn(reconnect_timer(7, Duration::from_secs(4), tx, CancellationToken::new()));

        match rx.recv().await {
            Some(SocketEvent::ReconnectDue { timer }) => assert_eq!(timer, 7),
            _ => panic!("expected ReconnectDue"),
        }
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_stays_silent() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(reconnect_timer(1, Duration::from_secs(4), tx, cancel.clone()));
        cancel.cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
