//! Per-tunnel mutual exclusion
//!
//! Every state transition holds its tunnel's lock for the duration, so
//! operations on one tunnel serialize while different tunnels proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

pub struct TunnelLocks {
    locks: Mutex<HashMap<i32, Arc<tokio::sync::Mutex<()>>>>,
}

impl TunnelLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the lock for one tunnel id, creating it on first use.
    /// Entries are never removed; the map is bounded by the number of
    /// tunnels ever touched.
    pub async fn acquire(&self, tunnel_id: i32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(tunnel_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

impl Default for TunnelLocks {
    fn default() -> Self {
        Self::new()
    }
}
