use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{ActiveBreak, Participant, PooledCandidate, Session, SessionId, UserId};
use tokio::sync::Mutex;

use crate::store::{RecordFilter, SessionStore};

#[derive(Debug)]
struct Row<T> {
    seq: u64,
    record: T,
}

#[derive(Debug, Default)]
struct Tables {
    next_seq: u64,
    sessions: Vec<Session>,
    participants: Vec<Row<Participant>>,
    active_breaks: Vec<Row<ActiveBreak>>,
    pool_entries: Vec<Row<PooledCandidate>>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// In-process `SessionStore` used by tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails as if the backing store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("memory store marked unavailable");
        }
        Ok(())
    }
}

fn select<T: Clone>(
    rows: &[Row<T>],
    filter: RecordFilter,
    key: impl Fn(&T) -> (SessionId, UserId, DateTime<Utc>),
) -> Vec<T> {
    let mut matched: Vec<(DateTime<Utc>, u64, T)> = rows
        .iter()
        .filter(|row| {
            let (session_id, user_id, _) = key(&row.record);
            filter.matches(session_id, user_id)
        })
        .map(|row| (key(&row.record).2, row.seq, row.record.clone()))
        .collect();
    matched.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    matched.into_iter().map(|(_, _, record)| record).collect()
}

fn remove<T>(
    rows: &mut Vec<Row<T>>,
    filter: RecordFilter,
    key: impl Fn(&T) -> (SessionId, UserId),
) -> u64 {
    let before = rows.len();
    rows.retain(|row| {
        let (session_id, user_id) = key(&row.record);
        !filter.matches(session_id, user_id)
    });
    (before - rows.len()) as u64
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn health_check(&self) -> Result<()> {
        self.check_available()
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables
            .sessions
            .retain(|existing| existing.session_id != session.session_id);
        tables.sessions.push(session.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: SessionId) -> Result<Option<Session>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|session| session.session_id == session_id)
            .cloned())
    }

    async fn find_participants(&self, filter: RecordFilter) -> Result<Vec<Participant>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(select(&tables.participants, filter, |p| {
            (p.session_id, p.user_id, p.joined_at)
        }))
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let seq = tables.next_seq();
        tables.participants.push(Row {
            seq,
            record: participant.clone(),
        });
        Ok(())
    }

    async fn delete_participants(&self, filter: RecordFilter) -> Result<u64> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        Ok(remove(&mut tables.participants, filter, |p| {
            (p.session_id, p.user_id)
        }))
    }

    async fn find_active_breaks(&self, filter: RecordFilter) -> Result<Vec<ActiveBreak>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(select(&tables.active_breaks, filter, |b| {
            (b.session_id, b.user_id, b.updated_at)
        }))
    }

    async fn insert_active_break(&self, active_break: &ActiveBreak) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let seq = tables.next_seq();
        tables.active_breaks.push(Row {
            seq,
            record: active_break.clone(),
        });
        Ok(())
    }

    async fn delete_active_breaks(&self, filter: RecordFilter) -> Result<u64> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        Ok(remove(&mut tables.active_breaks, filter, |b| {
            (b.session_id, b.user_id)
        }))
    }

    async fn find_pool_entries(&self, filter: RecordFilter) -> Result<Vec<PooledCandidate>> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(select(&tables.pool_entries, filter, |e| {
            (e.session_id, e.user_id, e.updated_at)
        }))
    }

    async fn insert_pool_entry(&self, entry: &PooledCandidate) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let seq = tables.next_seq();
        tables.pool_entries.push(Row {
            seq,
            record: entry.clone(),
        });
        Ok(())
    }

    async fn delete_pool_entries(&self, filter: RecordFilter) -> Result<u64> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        Ok(remove(&mut tables.pool_entries, filter, |e| {
            (e.session_id, e.user_id)
        }))
    }
}
