use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use shared::domain::{
    ActiveBreak, Member, Participant, PooledCandidate, Session, SessionId, UserId,
};

/// Equality filter shared by the participant, break and pool collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFilter {
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
}

impl RecordFilter {
    pub fn session(session_id: SessionId) -> Self {
        Self {
            session_id,
            user_id: None,
        }
    }

    pub fn user(session_id: SessionId, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id: Some(user_id),
        }
    }

    pub fn matches(&self, session_id: SessionId, user_id: UserId) -> bool {
        self.session_id == session_id && self.user_id.map_or(true, |wanted| wanted == user_id)
    }
}

/// Persistence seam for session state.
///
/// Implementors provide filtered fetch plus put/delete for the four record
/// kinds. `find_*` results are ordered by their timestamp ascending with ties
/// broken by insertion order. Nothing is cached: every call goes to the
/// backing store.
///
/// The provided methods build the idempotent session operations on top of
/// those primitives.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn health_check(&self) -> Result<()>;

    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn load_session(&self, session_id: SessionId) -> Result<Option<Session>>;

    async fn find_participants(&self, filter: RecordFilter) -> Result<Vec<Participant>>;
    async fn insert_participant(&self, participant: &Participant) -> Result<()>;
    async fn delete_participants(&self, filter: RecordFilter) -> Result<u64>;

    async fn find_active_breaks(&self, filter: RecordFilter) -> Result<Vec<ActiveBreak>>;
    async fn insert_active_break(&self, active_break: &ActiveBreak) -> Result<()>;
    async fn delete_active_breaks(&self, filter: RecordFilter) -> Result<u64>;

    async fn find_pool_entries(&self, filter: RecordFilter) -> Result<Vec<PooledCandidate>>;
    async fn insert_pool_entry(&self, entry: &PooledCandidate) -> Result<()>;
    async fn delete_pool_entries(&self, filter: RecordFilter) -> Result<u64>;

    async fn list_participants(&self, session_id: SessionId) -> Result<Vec<Participant>> {
        self.find_participants(RecordFilter::session(session_id))
            .await
    }

    async fn participant(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<Option<Participant>> {
        Ok(self
            .find_participants(RecordFilter::user(session_id, user_id))
            .await?
            .into_iter()
            .next())
    }

    /// Returns `None` when the user already participates.
    async fn add_participant(
        &self,
        session_id: SessionId,
        member: &Member,
    ) -> Result<Option<Participant>> {
        if self.participant(session_id, member.user_id).await?.is_some() {
            return Ok(None);
        }
        let participant = Participant::new(session_id, member, Utc::now());
        self.insert_participant(&participant).await?;
        Ok(Some(participant))
    }

    async fn remove_participant(&self, session_id: SessionId, user_id: UserId) -> Result<bool> {
        let removed = self
            .delete_participants(RecordFilter::user(session_id, user_id))
            .await?;
        Ok(removed > 0)
    }

    async fn list_active_breaks(&self, session_id: SessionId) -> Result<Vec<ActiveBreak>> {
        self.find_active_breaks(RecordFilter::session(session_id))
            .await
    }

    async fn add_active_break(
        &self,
        session_id: SessionId,
        user_id: UserId,
        mention: &str,
    ) -> Result<ActiveBreak> {
        let active_break = ActiveBreak {
            session_id,
            user_id,
            mention: mention.to_string(),
            updated_at: Utc::now(),
        };
        self.insert_active_break(&active_break).await?;
        Ok(active_break)
    }

    async fn remove_active_break(&self, session_id: SessionId, user_id: UserId) -> Result<bool> {
        let removed = self
            .delete_active_breaks(RecordFilter::user(session_id, user_id))
            .await?;
        Ok(removed > 0)
    }

    async fn list_pool(&self, session_id: SessionId) -> Result<Vec<PooledCandidate>> {
        self.find_pool_entries(RecordFilter::session(session_id))
            .await
    }

    async fn pool_entries_for(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<Vec<PooledCandidate>> {
        self.find_pool_entries(RecordFilter::user(session_id, user_id))
            .await
    }

    async fn add_pool_entry(
        &self,
        session_id: SessionId,
        user_id: UserId,
        mention: &str,
    ) -> Result<PooledCandidate> {
        let entry = PooledCandidate {
            session_id,
            user_id,
            mention: mention.to_string(),
            updated_at: Utc::now(),
        };
        self.insert_pool_entry(&entry).await?;
        Ok(entry)
    }

    async fn remove_pool_entries(&self, session_id: SessionId, user_id: UserId) -> Result<u64> {
        self.delete_pool_entries(RecordFilter::user(session_id, user_id))
            .await
    }
}
