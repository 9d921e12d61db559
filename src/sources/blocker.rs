//! Completion handles for artifacts that materialize in the background.
//!
//! A repository may hand back a file path before the bytes are on disk.
//! The accompanying `DownloadBlocker` is completed (or failed) by whoever
//! performs the transfer; callers wait on it before trusting the file.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// State of a pending materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockerState {
    Pending,
    Ready,
    Failed(String),
}

struct Inner {
    state: Mutex<BlockerState>,
    changed: Condvar,
}

/// A cloneable handle shared between the fetcher and its waiters.
#[derive(Clone)]
pub struct DownloadBlocker {
    inner: Arc<Inner>,
}

impl DownloadBlocker {
    /// Create a pending handle.
    pub fn new() -> Self {
        DownloadBlocker {
            inner: Arc::new(Inner {
                state: Mutex::new(BlockerState::Pending),
                changed: Condvar::new(),
            }),
        }
    }

    /// Create a handle that is already complete.
    pub fn ready() -> Self {
        let blocker = DownloadBlocker::new();
        blocker.complete();
        blocker
    }

    /// Mark the transfer as finished successfully.
    pub fn complete(&self) {
        self.set(BlockerState::Ready);
    }

    /// Mark the transfer as failed.
    pub fn fail(&self, reason: impl Into<String>) {
        self.set(BlockerState::Failed(reason.into()));
    }

    fn set(&self, next: BlockerState) {
        let mut state = self.inner.state.lock();
        // First completion wins
        if *state == BlockerState::Pending {
            *state = next;
            self.inner.changed.notify_all();
        }
    }

    /// Current state without waiting.
    pub fn state(&self) -> BlockerState {
        self.inner.state.lock().clone()
    }

    /// Wait at most `timeout` for the transfer to settle.
    ///
    /// Returns `Pending` if the deadline passed first.
    pub fn wait_timeout(&self, timeout: Duration) -> BlockerState {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();

        while *state == BlockerState::Pending {
            if Instant::now() >= deadline {
                break;
            }
            self.inner.changed.wait_until(&mut state, deadline);
        }

        state.clone()
    }
}

impl Default for DownloadBlocker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DownloadBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadBlocker")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ready_blocker() {
        let blocker = DownloadBlocker::ready();
        assert_eq!(blocker.state(), BlockerState::Ready);
        assert_eq!(
            blocker.wait_timeout(Duration::from_millis(1)),
            BlockerState::Ready
        );
    }

    #[test]
    fn test_wait_times_out_while_pending() {
        let blocker = DownloadBlocker::new();
        assert_eq!(
            blocker.wait_timeout(Duration::from_millis(20)),
            BlockerState::Pending
        );
    }

    #[test]
    fn test_completion_from_another_thread() {
        let blocker = DownloadBlocker::new();
        let fetcher = blocker.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            fetcher.complete();
        });

        assert_eq!(
            blocker.wait_timeout(Duration::from_secs(5)),
            BlockerState::Ready
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_first_completion_wins() {
        let blocker = DownloadBlocker::new();
        blocker.fail("connection reset");
        blocker.complete();
        assert_eq!(
            blocker.state(),
            BlockerState::Failed("connection reset".into())
        );
    }
}
