//! Egress and identity rotation
//!
//! One [`Rotation`] is shared by every task of a run. Egress selection is a
//! lock-free round-robin over the configured proxy pool: each caller takes a
//! ticket from an atomic counter, so concurrent callers can neither skip nor
//! duplicate a slot within a cycle. The client identity is an independent
//! uniform pick per request; it is returned as a value and never written
//! back into shared client state.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Built-in browser identities, rotated per request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/124.0.0.0 Mobile/15E148 \
     Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8 Pro) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/125.0.6422.0 Mobile Safari/537.36",
];

/// Shared rotation state of one scrape run.
#[derive(Debug)]
pub struct Rotation {
    pool_size: usize,
    cursor: AtomicUsize,
}

impl Rotation {
    /// Create rotation state over a proxy pool of `pool_size` entries.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next egress slot index, advancing the cursor; `None` when the pool is
    /// empty (direct connection).
    pub fn next_egress(&self) -> Option<usize> {
        if self.pool_size == 0 {
            return None;
        }
        Some(self.cursor.fetch_add(1, Ordering::Relaxed) % self.pool_size)
    }

    /// Uniformly random client identity for one request.
    pub fn random_user_agent(&self) -> &'static str {
        USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
    }
}
