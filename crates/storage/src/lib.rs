use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    ActiveBreak, ChannelId, GuildId, Participant, PooledCandidate, Session, SessionId,
    SessionKind, UserId,
};

mod memory;
mod store;

pub use memory::MemoryStore;
pub use store::{RecordFilter, SessionStore};

/// SQLite-backed `SessionStore`.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens a separate database, so
        // an in-memory store is pinned to one connection that never recycles.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run session migrations")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionStore for Storage {
    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (
                session_id,
                guild_id,
                guild_name,
                channel_id,
                channel_name,
                author_id,
                author_name,
                author_display_name,
                kind,
                created_at_us,
                updated_at_us
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET updated_at_us = excluded.updated_at_us",
        )
        .bind(session.session_id.0)
        .bind(session.guild_id.0)
        .bind(&session.guild_name)
        .bind(session.channel_id.0)
        .bind(&session.channel_name)
        .bind(session.author_id.0)
        .bind(&session.author_name)
        .bind(&session.author_display_name)
        .bind(session.kind.as_str())
        .bind(session.created_at.timestamp_micros())
        .bind(session.updated_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .context("failed to insert session")?;
        Ok(())
    }

    async fn load_session(&self, session_id: SessionId) -> Result<Option<Session>> {
        let row = sqlx::query(
            "SELECT session_id, guild_id, guild_name, channel_id, channel_name, author_id,
                    author_name, author_display_name, kind, created_at_us, updated_at_us
             FROM sessions
             WHERE session_id = ?",
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load session")?;
        row.map(|r| session_from_row(&r)).transpose()
    }

    async fn find_participants(&self, filter: RecordFilter) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT session_id, user_id, name, display_name, mention, joined_at_us
             FROM participants
             WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)
             ORDER BY joined_at_us ASC, id ASC",
        )
        .bind(filter.session_id.0)
        .bind(filter.user_id.map(|u| u.0))
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch participants")?;
        rows.iter()
            .map(|r| -> Result<Participant> {
                Ok(Participant {
                    session_id: SessionId(r.try_get("session_id")?),
                    user_id: UserId(r.try_get("user_id")?),
                    name: r.try_get("name")?,
                    display_name: r.try_get("display_name")?,
                    mention: r.try_get("mention")?,
                    joined_at: from_micros(r.try_get("joined_at_us")?)?,
                })
            })
            .collect()
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<()> {
        sqlx::query(
            "INSERT INTO participants (session_id, user_id, name, display_name, mention, joined_at_us)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id, user_id) DO NOTHING",
        )
        .bind(participant.session_id.0)
        .bind(participant.user_id.0)
        .bind(&participant.name)
        .bind(&participant.display_name)
        .bind(&participant.mention)
        .bind(participant.joined_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .context("failed to insert participant")?;
        Ok(())
    }

    async fn delete_participants(&self, filter: RecordFilter) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM participants WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)",
        )
        .bind(filter.session_id.0)
        .bind(filter.user_id.map(|u| u.0))
        .execute(&self.pool)
        .await
        .context("failed to delete participants")?;
        Ok(result.rows_affected())
    }

    async fn find_active_breaks(&self, filter: RecordFilter) -> Result<Vec<ActiveBreak>> {
        let rows = sqlx::query(
            "SELECT session_id, user_id, mention, updated_at_us
             FROM active_breaks
             WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)
             ORDER BY updated_at_us ASC, id ASC",
        )
        .bind(filter.session_id.0)
        .bind(filter.user_id.map(|u| u.0))
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch active breaks")?;
        rows.iter()
            .map(|r| -> Result<ActiveBreak> {
                Ok(ActiveBreak {
                    session_id: SessionId(r.try_get("session_id")?),
                    user_id: UserId(r.try_get("user_id")?),
                    mention: r.try_get("mention")?,
                    updated_at: from_micros(r.try_get("updated_at_us")?)?,
                })
            })
            .collect()
    }

    async fn insert_active_break(&self, active_break: &ActiveBreak) -> Result<()> {
        sqlx::query(
            "INSERT INTO active_breaks (session_id, user_id, mention, updated_at_us)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(session_id, user_id) DO UPDATE SET
                mention = excluded.mention,
                updated_at_us = excluded.updated_at_us",
        )
        .bind(active_break.session_id.0)
        .bind(active_break.user_id.0)
        .bind(&active_break.mention)
        .bind(active_break.updated_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .context("failed to insert active break")?;
        Ok(())
    }

    async fn delete_active_breaks(&self, filter: RecordFilter) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM active_breaks WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)",
        )
        .bind(filter.session_id.0)
        .bind(filter.user_id.map(|u| u.0))
        .execute(&self.pool)
        .await
        .context("failed to delete active breaks")?;
        Ok(result.rows_affected())
    }

    async fn find_pool_entries(&self, filter: RecordFilter) -> Result<Vec<PooledCandidate>> {
        let rows = sqlx::query(
            "SELECT session_id, user_id, mention, updated_at_us
             FROM pool_entries
             WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)
             ORDER BY updated_at_us ASC, id ASC",
        )
        .bind(filter.session_id.0)
        .bind(filter.user_id.map(|u| u.0))
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch pool entries")?;
        rows.iter()
            .map(|r| -> Result<PooledCandidate> {
                Ok(PooledCandidate {
                    session_id: SessionId(r.try_get("session_id")?),
                    user_id: UserId(r.try_get("user_id")?),
                    mention: r.try_get("mention")?,
                    updated_at: from_micros(r.try_get("updated_at_us")?)?,
                })
            })
            .collect()
    }

    async fn insert_pool_entry(&self, entry: &PooledCandidate) -> Result<()> {
        sqlx::query(
            "INSERT INTO pool_entries (session_id, user_id, mention, updated_at_us)
             VALUES (?, ?, ?, ?)",
        )
        .bind(entry.session_id.0)
        .bind(entry.user_id.0)
        .bind(&entry.mention)
        .bind(entry.updated_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .context("failed to insert pool entry")?;
        Ok(())
    }

    async fn delete_pool_entries(&self, filter: RecordFilter) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM pool_entries WHERE session_id = ?1 AND (?2 IS NULL OR user_id = ?2)",
        )
        .bind(filter.session_id.0)
        .bind(filter.user_id.map(|u| u.0))
        .execute(&self.pool)
        .await
        .context("failed to delete pool entries")?;
        Ok(result.rows_affected())
    }
}

fn session_from_row(r: &SqliteRow) -> Result<Session> {
    let kind: String = r.try_get("kind")?;
    Ok(Session {
        session_id: SessionId(r.try_get("session_id")?),
        guild_id: GuildId(r.try_get("guild_id")?),
        guild_name: r.try_get("guild_name")?,
        channel_id: ChannelId(r.try_get("channel_id")?),
        channel_name: r.try_get("channel_name")?,
        author_id: UserId(r.try_get("author_id")?),
        author_name: r.try_get("author_name")?,
        author_display_name: r.try_get("author_display_name")?,
        kind: SessionKind::parse(&kind).ok_or_else(|| anyhow!("unknown session kind '{kind}'"))?,
        created_at: from_micros(r.try_get("created_at_us")?)?,
        updated_at: from_micros(r.try_get("updated_at_us")?)?,
    })
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| anyhow!("timestamp out of range: {micros}"))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
