//! Refetch coalescer
//!
//! The first change signal after idle opens a burst due at `now + window`;
//! later signals in the window are absorbed. When the burst is taken the
//! controller issues exactly one refetch, which is issued after the last
//! absorbed signal and so reflects it.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
pub struct RefetchCoalescer {
    window: Duration,
    due_at: Option<Instant>,
    absorbed: usize,
}

impl RefetchCoalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            due_at: None,
            absorbed: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record one change signal. Returns true when it opened a new burst.
    pub fn signal(&mut self) -> bool {
        self.absorbed += 1;
        if self.due_at.is_some() {
            return false;
        }
        self.due_at = Some(Instant::now() + self.window);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    /// When the open burst is due
    pub fn due_at(&self) -> Option<Instant> {
        self.due_at
    }

    /// Resolves once the open burst is due. Never resolves while idle.
    pub async fn due(&self) {
        match self.due_at {
            Some(at) => sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    /// Close the open burst, returning how many signals it absorbed
    pub fn take(&mut self) -> usize {
        self.due_at = None;
        std::mem::take(&mut self.absorbed)
    }
}
