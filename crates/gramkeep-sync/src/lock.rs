//! Per-account sync mutual exclusion.
//!
//! The engine keeps no cross-pass state except this advisory lock: a
//! sync request for an account that already has a pass in flight is
//! rejected immediately instead of queued behind it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

/// In-process advisory lock keyed by account id.
///
/// Clones share the same underlying set, so every engine handle in the
/// process agrees on which accounts are mid-sync.
#[derive(Debug, Clone, Default)]
pub struct SyncLock {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim `account_id`.  Returns `None` while another claim is
    /// outstanding; the claim is released when the guard drops.
    pub fn try_acquire(&self, account_id: Uuid) -> Option<SyncGuard> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !in_flight.insert(account_id) {
            return None;
        }

        Some(SyncGuard {
            account_id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

/// Releases the per-account claim when dropped.
#[must_use = "dropping the guard releases the sync claim"]
pub struct SyncGuard {
    account_id: Uuid,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.account_id);
    }
}
