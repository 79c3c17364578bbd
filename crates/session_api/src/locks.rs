use std::{collections::HashMap, sync::Arc};

use shared::domain::SessionId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per session so actions on a session never interleave
/// while different sessions proceed in parallel.
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<SessionId, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `session_id`. Access is released when
    /// the guard drops, including on early return or error.
    pub async fn acquire(&self, session_id: SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            // Idle entries are only referenced by the map itself.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(session_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn tracked_sessions(&self) -> usize {
        self.inner.lock().await.len()
    }
}
