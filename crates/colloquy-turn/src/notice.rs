//! Outbound notices for operators and UIs.

use serde::{Deserialize, Serialize};

use colloquy_core::types::Timestamp;

use crate::state::TurnState;

/// Something the coordinator did or observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnNotice {
    pub at: Timestamp,
    pub kind: NoticeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoticeKind {
    StateChanged { from: TurnState, to: TurnState },
    /// A user utterance was forwarded to the bot.
    UserSaid { text: String },
    /// A bot reply is being spoken.
    BotSaid { text: String },
    /// A non-fatal error. The conversation may have been reset.
    Error { message: String },
}

impl TurnNotice {
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            at: Timestamp::now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_serializes_tagged() {
        let notice = TurnNotice::new(NoticeKind::StateChanged {
            from: TurnState::Idle,
            to: TurnState::AwaitingBotReply,
        });
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["kind"]["type"], "state_changed");
        assert_eq!(json["kind"]["from"], "idle");
        assert_eq!(json["kind"]["to"], "awaiting_bot_reply");
    }
}
