use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SessionError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// SessionId is the id of the interactive message that hosts the session.
id_newtype!(SessionId);
id_newtype!(UserId);
id_newtype!(GuildId);
id_newtype!(ChannelId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Break rotation board.
    #[default]
    Qk,
    /// Recruiting post.
    Bosyu,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Qk => "qk",
            SessionKind::Bosyu => "bosyu",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "qk" => Some(SessionKind::Qk),
            "bosyu" => Some(SessionKind::Bosyu),
            _ => None,
        }
    }
}

/// Display metadata captured when the session message is posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub session_id: SessionId,
    pub guild_id: GuildId,
    pub guild_name: String,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub author_id: UserId,
    pub author_name: String,
    pub author_display_name: String,
    #[serde(default)]
    pub kind: SessionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub guild_id: GuildId,
    pub guild_name: String,
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub author_id: UserId,
    pub author_name: String,
    pub author_display_name: String,
    pub kind: SessionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn from_new(new: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            session_id: new.session_id,
            guild_id: new.guild_id,
            guild_name: new.guild_name,
            channel_id: new.channel_id,
            channel_name: new.channel_name,
            author_id: new.author_id,
            author_name: new.author_name,
            author_display_name: new.author_display_name,
            kind: new.kind,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The chat user behind a join action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub name: String,
    pub display_name: String,
    pub mention: String,
}

impl Member {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            user_id,
            display_name: name.clone(),
            mention: format!("<@{}>", user_id.0),
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub name: String,
    pub display_name: String,
    pub mention: String,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(session_id: SessionId, member: &Member, joined_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            user_id: member.user_id,
            name: member.name.clone(),
            display_name: member.display_name.clone(),
            mention: member.mention.clone(),
            joined_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBreak {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub mention: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledCandidate {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub mention: String,
    pub updated_at: DateTime<Utc>,
}

/// Number of participants sent on break by one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BreakSize(u8);

impl BreakSize {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn get(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = BreakSize> {
        (Self::MIN..=Self::MAX).map(BreakSize)
    }
}

impl TryFrom<u8> for BreakSize {
    type Error = SessionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SessionError::InvalidRequest(format!(
                "break size must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }
}

impl From<BreakSize> for u8 {
    fn from(value: BreakSize) -> Self {
        value.0
    }
}

impl fmt::Display for BreakSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_size_accepts_supported_range() {
        let sizes: Vec<usize> = BreakSize::all().map(BreakSize::get).collect();
        assert_eq!(sizes, vec![1, 2, 3, 4]);
        assert!(BreakSize::try_from(0).is_err());
        assert!(BreakSize::try_from(5).is_err());
    }

    #[test]
    fn break_size_rejects_out_of_range_json() {
        let parsed: Result<BreakSize, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
        let parsed: BreakSize = serde_json::from_str("3").expect("size");
        assert_eq!(parsed.get(), 3);
    }

    #[test]
    fn session_kind_round_trips_through_str() {
        for kind in [SessionKind::Qk, SessionKind::Bosyu] {
            assert_eq!(SessionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SessionKind::parse("other"), None);
    }
}
