//! One-shot, cancellable phase timer.

use std::future::Future;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A deferred callback armed when a session enters a timed phase.
///
/// Cancelling only stops the wait: once the deadline has passed, the
/// callback runs to completion even if `cancel` is called concurrently, so
/// the callback itself must re-validate the session before mutating it.
#[derive(Debug)]
pub struct PhaseTimer {
    token: CancellationToken,
}

impl PhaseTimer {
    /// Spawns a task that runs `on_expiry` at `deadline` unless cancelled
    /// first. A deadline already in the past fires on the next poll.
    pub fn arm<F, Fut>(deadline: Instant, on_expiry: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = child.cancelled() => {
                    debug!("Phase timer cancelled before expiry");
                }

                _ = sleep_until(deadline) => {
                    on_expiry().await;
                }
            }
        });

        Self { token }
    }

    /// Stops the timer. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.token.cancel();
    }

}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn counting_timer(delay: Duration, fired: &Arc<AtomicUsize>) -> PhaseTimer {
        let fired = Arc::clone(fired);
        PhaseTimer::arm(Instant::now() + delay, move || async move {
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let _timer = counting_timer(Duration::from_secs(2), &fired);

        sleep(Duration::from_millis(1900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = counting_timer(Duration::from_secs(1), &fired);

        timer.cancel();
        timer.cancel();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        drop(counting_timer(Duration::from_secs(1), &fired));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_absolute_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let deadline = Instant::now() + Duration::from_secs(3);

        // Arming late does not push the deadline back
        sleep(Duration::from_secs(1)).await;
        let counter = Arc::clone(&fired);
        let _timer = PhaseTimer::arm(deadline, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(1900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
