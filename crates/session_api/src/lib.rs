use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use shared::{
    domain::{BreakSize, Member, NewSession, Session, SessionId, UserId},
    error::SessionError,
    protocol::{SessionAction, SessionView},
};
use storage::SessionStore;
use tracing::{debug, info, warn};

pub mod locks;
pub mod rotation;

use locks::SessionLocks;
use rotation::select_break;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Upper bound for one controller action, store calls included.
    pub store_timeout: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Entry point for session actions coming from the presentation layer.
///
/// Every method runs under the session's exclusive lock. Actions are not
/// transactional across store calls: a failure part way through a break
/// selection can leave the previous breaks cleared without new ones assigned.
pub struct SessionController<S: SessionStore + ?Sized> {
    store: Arc<S>,
    locks: SessionLocks,
    options: ControllerOptions,
}

impl<S: SessionStore + ?Sized> Clone for SessionController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: SessionStore + ?Sized> SessionController<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, ControllerOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: ControllerOptions) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records the session posted for an interactive message. Posting the
    /// same message twice keeps the first record.
    pub async fn create_session(&self, new_session: NewSession) -> Result<Session, SessionError> {
        let session_id = new_session.session_id;
        self.exclusive(session_id, async {
            if let Some(existing) = self.store.load_session(session_id).await? {
                debug!(%session_id, "session already recorded");
                return Ok(existing);
            }
            let session = Session::from_new(new_session, Utc::now());
            self.store.insert_session(&session).await?;
            info!(
                %session_id,
                kind = session.kind.as_str(),
                guild = %session.guild_name,
                "session created"
            );
            Ok::<_, anyhow::Error>(session)
        })
        .await
    }

    pub async fn session(&self, session_id: SessionId) -> Result<Session, SessionError> {
        self.exclusive(session_id, async { self.store.load_session(session_id).await })
            .await?
            .ok_or_else(|| SessionError::not_found("session", session_id))
    }

    pub async fn join(
        &self,
        session_id: SessionId,
        member: &Member,
    ) -> Result<SessionView, SessionError> {
        self.exclusive(session_id, async {
            let user_id = member.user_id;
            if self.store.add_participant(session_id, member).await?.is_none() {
                debug!(%session_id, %user_id, "already joined");
                return self.snapshot(session_id).await;
            }
            if self
                .store
                .pool_entries_for(session_id, user_id)
                .await?
                .is_empty()
            {
                self.store
                    .add_pool_entry(session_id, user_id, &member.mention)
                    .await?;
            }
            info!(%session_id, %user_id, "participant joined");
            self.snapshot(session_id).await
        })
        .await
    }

    pub async fn leave(
        &self,
        session_id: SessionId,
        user_id: UserId,
    ) -> Result<SessionView, SessionError> {
        self.exclusive(session_id, async {
            let was_participant = self.store.remove_participant(session_id, user_id).await?;
            self.store.remove_active_break(session_id, user_id).await?;
            let pool_removed = self.store.remove_pool_entries(session_id, user_id).await?;
            if was_participant {
                info!(%session_id, %user_id, pool_removed, "participant left");
            } else {
                debug!(%session_id, %user_id, "leave for non-participant");
            }
            self.snapshot(session_id).await
        })
        .await
    }

    /// Validates `size` before touching any state, then rotates breaks.
    pub async fn request_break(
        &self,
        session_id: SessionId,
        size: u8,
    ) -> Result<SessionView, SessionError> {
        let size = BreakSize::try_from(size)?;
        self.take_break(session_id, size).await
    }

    pub async fn take_break(
        &self,
        session_id: SessionId,
        size: BreakSize,
    ) -> Result<SessionView, SessionError> {
        self.exclusive(session_id, async {
            select_break(self.store.as_ref(), session_id, size).await?;
            self.snapshot(session_id).await
        })
        .await
    }

    pub async fn current_view(&self, session_id: SessionId) -> Result<SessionView, SessionError> {
        self.exclusive(session_id, self.snapshot(session_id)).await
    }

    pub async fn dispatch(
        &self,
        session_id: SessionId,
        action: SessionAction,
    ) -> Result<SessionView, SessionError> {
        match action {
            SessionAction::Join { member } => self.join(session_id, &member).await,
            SessionAction::Leave { user_id } => self.leave(session_id, user_id).await,
            SessionAction::TakeBreak { size } => self.take_break(session_id, size).await,
        }
    }

    async fn snapshot(&self, session_id: SessionId) -> anyhow::Result<SessionView> {
        let participants = self.store.list_participants(session_id).await?;
        let active_breaks = self.store.list_active_breaks(session_id).await?;
        Ok(SessionView::new(session_id, participants, active_breaks))
    }

    async fn exclusive<T, F>(&self, session_id: SessionId, action: F) -> Result<T, SessionError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let _guard = self.locks.acquire(session_id).await;
        match tokio::time::timeout(self.options.store_timeout, action).await {
            Ok(result) => result.map_err(|err| unavailable(session_id, err)),
            Err(_) => {
                warn!(%session_id, timeout = ?self.options.store_timeout, "session action timed out");
                Err(SessionError::StoreUnavailable(format!(
                    "session {session_id} action timed out after {:?}",
                    self.options.store_timeout
                )))
            }
        }
    }
}

fn unavailable(session_id: SessionId, err: anyhow::Error) -> SessionError {
    warn!(%session_id, error = %format!("{err:#}"), "session store call failed");
    SessionError::StoreUnavailable(format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
