//! Break rotation over a session's fairness pool.
//!
//! The pool is a FIFO of participants waiting for their next break. Each
//! selection takes the oldest entries. When the pool cannot cover a request
//! it is rebuilt from the full participant list instead of being topped up,
//! so a round always restarts in join order.

use std::collections::HashSet;

use anyhow::Result;
use shared::domain::{ActiveBreak, BreakSize, SessionId, UserId};
use storage::{RecordFilter, SessionStore};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakSelection {
    /// Users now on break, in pool order.
    pub selected: Vec<ActiveBreak>,
    /// Whether the pool was rebuilt to serve this request.
    pub replenished: bool,
}

impl BreakSelection {
    pub fn user_ids(&self) -> Vec<UserId> {
        self.selected.iter().map(|b| b.user_id).collect()
    }
}

/// Ends every current break and puts up to `size` pooled participants on
/// break.
///
/// Entries minted by a replenishment stay in the pool when selected; only
/// entries that survived from earlier rounds are consumed. Fewer than `size`
/// users are selected when the session has fewer participants.
pub async fn select_break<S>(store: &S, session_id: SessionId, size: BreakSize) -> Result<BreakSelection>
where
    S: SessionStore + ?Sized,
{
    let cleared = store
        .delete_active_breaks(RecordFilter::session(session_id))
        .await?;
    debug!(%session_id, cleared, "cleared active breaks");

    let mut pool = store.list_pool(session_id).await?;
    let participants = store.list_participants(session_id).await?;
    if participants.is_empty() {
        debug!(%session_id, "no participants; nothing to rotate");
        return Ok(BreakSelection::default());
    }

    let wanted = size.get();
    let mut excluded: HashSet<UserId> = HashSet::new();
    let replenished = pool.len() < wanted;
    if replenished {
        excluded.extend(pool.iter().map(|entry| entry.user_id));
        store
            .delete_pool_entries(RecordFilter::session(session_id))
            .await?;

        pool.clear();
        for participant in &participants {
            let entry = store
                .add_pool_entry(session_id, participant.user_id, &participant.mention)
                .await?;
            excluded.insert(entry.user_id);
            pool.push(entry);
        }
        info!(
            %session_id,
            pool_size = pool.len(),
            requested = wanted,
            "replenished break pool"
        );
    }

    let mut selected = Vec::with_capacity(wanted);
    let mut seen: HashSet<UserId> = HashSet::new();
    for entry in pool.into_iter().take(wanted) {
        if !seen.insert(entry.user_id) {
            continue;
        }
        if !excluded.contains(&entry.user_id) {
            store
                .remove_pool_entries(session_id, entry.user_id)
                .await?;
        }
        let active = store
            .add_active_break(session_id, entry.user_id, &entry.mention)
            .await?;
        selected.push(active);
    }

    info!(
        %session_id,
        %size,
        selected = selected.len(),
        replenished,
        "selected break rotation"
    );
    Ok(BreakSelection {
        selected,
        replenished,
    })
}
