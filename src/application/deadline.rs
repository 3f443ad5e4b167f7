//! Deadline enforcement for task bodies.
//!
//! The body runs on a dedicated thread while the caller waits on a channel
//! with a timeout. On overrun the caller stops waiting and reports a
//! timeout; the body itself is not interrupted and its eventual result is
//! discarded. Bodies that touch external state must therefore tolerate
//! completing after their submission has already failed.

use std::sync::mpsc;
use std::time::Duration;

/// Why a raced body produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceError {
    /// The deadline elapsed before the body finished.
    DeadlineExceeded,
    /// The body thread went away without reporting. Only reachable when
    /// the body escapes its panic wrapper.
    BodyVanished,
}

/// Run `body` with a deadline, abandoning it on overrun.
pub fn race<R, F>(deadline: Duration, body: F) -> Result<R, RaceError>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        // The receiver is gone if the caller already timed out.
        let _ = tx.send(body());
    });
    match rx.recv_timeout(deadline) {
        Ok(result) => Ok(result),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(RaceError::DeadlineExceeded),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(RaceError::BodyVanished),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fast_body_wins() {
        let result = race(Duration::from_secs(1), || 7);
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_slow_body_times_out() {
        let result = race(Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(200));
            7
        });
        assert_eq!(result, Err(RaceError::DeadlineExceeded));
    }

    #[test]
    fn test_abandoned_body_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);

        let result = race(Duration::from_millis(20), move || {
            thread::sleep(Duration::from_millis(100));
            finished_clone.store(true, Ordering::SeqCst);
        });
        assert_eq!(result, Err(RaceError::DeadlineExceeded));
        assert!(!finished.load(Ordering::SeqCst));

        // The body was abandoned, not cancelled.
        thread::sleep(Duration::from_millis(200));
        assert!(finished.load(Ordering::SeqCst));
    }
}
