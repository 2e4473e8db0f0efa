use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// Fixed-interval polling budget: at most `max_attempts` probes, `interval`
/// apart. Used for login, upload and submit waits and for element polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_attempts: u32,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready(T),
    Exhausted { attempts: u32 },
    Cancelled,
}

impl Backoff {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Budget covering `total` wall-clock time when polling every `interval`.
    pub fn within(total: Duration, interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1);
        let attempts = (total.as_millis() / interval_ms) as u32 + 1;
        Self::new(attempts, interval)
    }

    /// Polls `probe` until it yields a value, the budget runs out or `cancel`
    /// fires. The sleep between probes is the only suspension point besides
    /// the probe itself.
    pub async fn poll<T, F, Fut>(&self, cancel: &CancellationToken, mut probe: F) -> WaitOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if let Some(value) = probe(attempt).await {
                return WaitOutcome::Ready(value);
            }
            if attempt == self.max_attempts {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        WaitOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_first_ready_value() {
        let backoff = Backoff::new(5, Duration::from_millis(1));
        let outcome = backoff
            .poll(&CancellationToken::new(), |attempt| async move {
                (attempt == 3).then_some(attempt)
            })
            .await;
        assert_eq!(outcome, WaitOutcome::Ready(3));
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let backoff = Backoff::new(2, Duration::from_millis(1));
        let mut calls = 0;
        let outcome: WaitOutcome<()> = backoff
            .poll(&CancellationToken::new(), |_| {
                calls += 1;
                async { None }
            })
            .await;
        assert_eq!(outcome, WaitOutcome::Exhausted { attempts: 2 });
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_polling() {
        let cancel = CancellationToken::new();
        let backoff = Backoff::new(1_000, Duration::from_secs(60));
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let outcome: WaitOutcome<()> = backoff.poll(&cancel, |_| async { None }).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[test]
    fn within_covers_total_budget() {
        let backoff = Backoff::within(Duration::from_secs(300), Duration::from_secs(5));
        assert_eq!(backoff.max_attempts, 61);
    }
}
