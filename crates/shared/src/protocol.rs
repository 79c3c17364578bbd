use serde::{Deserialize, Serialize};

use crate::{
    domain::{ActiveBreak, BreakSize, Member, Participant, SessionId, UserId},
    error::SessionError,
};

pub const BUTTON_LABEL_JOIN: &str = "参加";
pub const BUTTON_LABEL_LEAVE: &str = "退出";
pub const BUTTON_LABELS_BREAK: [&str; 4] = ["休憩1", "休憩2", "休憩3", "休憩4"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum SessionAction {
    Join { member: Member },
    Leave { user_id: UserId },
    TakeBreak { size: BreakSize },
}

impl SessionAction {
    /// Maps a clicked button on the session message to the action it triggers.
    pub fn from_button_label(label: &str, member: Member) -> Result<Self, SessionError> {
        if label == BUTTON_LABEL_JOIN {
            return Ok(Self::Join { member });
        }
        if label == BUTTON_LABEL_LEAVE {
            return Ok(Self::Leave {
                user_id: member.user_id,
            });
        }
        let position = BUTTON_LABELS_BREAK
            .iter()
            .position(|candidate| *candidate == label)
            .ok_or_else(|| SessionError::InvalidRequest(format!("unknown button '{label}'")))?;
        let size = u8::try_from(position + 1)
            .map_err(|_| SessionError::InvalidRequest(format!("unknown button '{label}'")))?;
        Ok(Self::TakeBreak {
            size: BreakSize::try_from(size)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub user_id: UserId,
    pub display_name: String,
    pub mention: String,
}

impl From<Participant> for ParticipantSummary {
    fn from(value: Participant) -> Self {
        Self {
            user_id: value.user_id,
            display_name: value.display_name,
            mention: value.mention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakSummary {
    pub user_id: UserId,
    pub mention: String,
}

impl From<ActiveBreak> for BreakSummary {
    fn from(value: ActiveBreak) -> Self {
        Self {
            user_id: value.user_id,
            mention: value.mention,
        }
    }
}

/// Snapshot handed back to the presentation layer after every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub participants: Vec<ParticipantSummary>,
    pub active_breaks: Vec<BreakSummary>,
}

impl SessionView {
    pub fn new(
        session_id: SessionId,
        participants: Vec<Participant>,
        active_breaks: Vec<ActiveBreak>,
    ) -> Self {
        Self {
            session_id,
            participants: participants.into_iter().map(Into::into).collect(),
            active_breaks: active_breaks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn participant_ids(&self) -> Vec<UserId> {
        self.participants.iter().map(|p| p.user_id).collect()
    }

    pub fn break_ids(&self) -> Vec<UserId> {
        self.active_breaks.iter().map(|b| b.user_id).collect()
    }

    /// Message content that pings everyone currently on break.
    pub fn break_mentions(&self) -> String {
        self.active_breaks
            .iter()
            .map(|b| b.mention.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> Member {
        Member::new(UserId(7), "alice")
    }

    #[test]
    fn maps_button_labels_to_actions() {
        assert!(matches!(
            SessionAction::from_button_label("参加", member()),
            Ok(SessionAction::Join { .. })
        ));
        assert!(matches!(
            SessionAction::from_button_label("退出", member()),
            Ok(SessionAction::Leave { user_id: UserId(7) })
        ));
        let Ok(SessionAction::TakeBreak { size }) =
            SessionAction::from_button_label("休憩3", member())
        else {
            panic!("expected break action");
        };
        assert_eq!(size.get(), 3);
    }

    #[test]
    fn rejects_unknown_button_label() {
        let err = SessionAction::from_button_label("休憩5", member()).expect_err("unknown");
        assert!(matches!(err, SessionError::InvalidRequest(_)));
    }

    #[test]
    fn break_mentions_join_with_spaces() {
        let view = SessionView {
            session_id: SessionId(1),
            participants: Vec::new(),
            active_breaks: vec![
                BreakSummary {
                    user_id: UserId(1),
                    mention: "<@1>".into(),
                },
                BreakSummary {
                    user_id: UserId(2),
                    mention: "<@2>".into(),
                },
            ],
        };
        assert_eq!(view.break_mentions(), "<@1> <@2>");
    }
}
