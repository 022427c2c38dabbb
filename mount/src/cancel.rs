//! Cooperative cancellation for scan and tracking sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often an interruptible wait re-checks its token.
pub const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Shared stop flag, checked between motion steps and inside dwell waits.
///
/// Clones share the flag. A cancel request is sticky until [`CancelToken::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running session to stop at its next cancellation point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can serve another session.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Sleep for `duration`, waking early if the token fires.
///
/// Returns `false` if cancellation was observed, `true` once the full
/// duration has elapsed with the token untouched.
pub fn sleep_unless_cancelled(token: &CancelToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(CANCEL_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_token_short_circuits_the_sleep() {
        let token = CancelToken::new();
        token.cancel();

        let start = Instant::now();
        assert!(!sleep_unless_cancelled(&token, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn quiet_token_sleeps_the_full_duration() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(sleep_unless_cancelled(&token, Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_from_another_thread_wakes_the_sleeper() {
        let token = CancelToken::new();
        let waker = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            waker.cancel();
        });

        let start = Instant::now();
        assert!(!sleep_unless_cancelled(&token, Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
        handle.join().unwrap();
    }

    #[test]
    fn reset_rearms_the_token() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!token.is_cancelled());
        assert!(sleep_unless_cancelled(&token, Duration::ZERO));
    }
}
