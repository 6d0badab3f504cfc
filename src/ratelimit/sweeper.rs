//! Background task that evicts idle windows.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use super::clock::Clock;
use super::limiter::RateLimiter;

/// Handle to a running sweep task.
///
/// Dropping the handle detaches the task; it then runs until the runtime
/// shuts down. Call [`Sweeper::shutdown`] to stop it explicitly.
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping `limiter` every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<C>(limiter: Arc<RateLimiter<C>>, interval: Duration) -> Self
    where
        C: Clock + 'static,
    {
        let interval = interval.max(Duration::from_millis(1));
        info!(
            interval_ms = interval.as_millis() as u64,
            retention_ms = limiter.policy().idle_retention().as_millis() as u64,
            "Starting window sweeper"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(
                        removed = removed,
                        remaining = limiter.window_count(),
                        "Evicted idle windows"
                    );
                } else {
                    trace!(remaining = limiter.window_count(), "Sweep found no idle windows");
                }
            }
        });

        Self { handle }
    }

    /// Whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the sweep task and wait for it to exit.
    pub async fn shutdown(self) {
        self.handle.abort();
        // An aborted task resolves to a cancellation error
        let _ = self.handle.await;
        info!("Window sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{ClientKey, ManualClock, Policy};

    #[tokio::test]
    async fn test_sweeper_evicts_idle_windows() {
        let clock = Arc::new(ManualClock::new());
        let policy = Policy::new(3, Duration::from_secs(1)).unwrap();
        let limiter = Arc::new(RateLimiter::with_clock(policy, Arc::clone(&clock)));

        limiter.check(&ClientKey::from("a"));
        limiter.check(&ClientKey::from("b"));
        assert_eq!(limiter.window_count(), 2);

        let sweeper = Sweeper::spawn(Arc::clone(&limiter), Duration::from_millis(10));

        // Nothing is idle yet
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(limiter.window_count(), 2);

        // Both windows emptied at t=1 and have been idle for a full window
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(limiter.window_count(), 0);

        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_shutdown() {
        let limiter = Arc::new(RateLimiter::new(Policy::default()));
        let sweeper = Sweeper::spawn(limiter, Duration::from_millis(10));

        assert!(!sweeper.is_finished());
        sweeper.shutdown().await;
    }
}
