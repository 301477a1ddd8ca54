use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Who produced an utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The human talking into the microphone.
    User,
    /// The conversational bot on the far side of the transport.
    Bot,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Bot => write!(f, "bot"),
        }
    }
}

// =============================================================================
// Newtypes
// =============================================================================

/// Opaque conversation identifier assigned by the bot service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a raw id. Returns `None` for empty or whitespace-only ids, which
    /// can never address a conversation.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cursor into the bot's message stream: the highest sequence number
/// already consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(pub u64);

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one continuous-recognition session. A new session is opened
/// each time the coordinator starts listening; events tagged with any other
/// session are stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenSession(pub u64);

impl fmt::Display for ListenSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listen#{}", self.0)
    }
}

/// Identifies one play request handed to the playback sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaybackId(pub u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playback#{}", self.0)
    }
}

// =============================================================================
// Structs
// =============================================================================

/// A single finished line of conversation. Immutable once created; the text
/// is never blank, including when deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UtteranceRecord")]
pub struct Utterance {
    speaker: Speaker,
    text: String,
    sequence: u64,
}

#[derive(Deserialize)]
struct UtteranceRecord {
    speaker: Speaker,
    text: String,
    sequence: u64,
}

impl TryFrom<UtteranceRecord> for Utterance {
    type Error = &'static str;

    fn try_from(record: UtteranceRecord) -> std::result::Result<Self, Self::Error> {
        Utterance::new(record.speaker, record.text, record.sequence)
            .ok_or("utterance text must not be blank")
    }
}

impl Utterance {
    /// Create an utterance. Returns `None` when `text` is empty or whitespace.
    pub fn new(speaker: Speaker, text: impl Into<String>, sequence: u64) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            speaker,
            text,
            sequence,
        })
    }

    pub fn bot(text: impl Into<String>, sequence: u64) -> Option<Self> {
        Self::new(Speaker::Bot, text, sequence)
    }

    pub fn user(text: impl Into<String>, sequence: u64) -> Option<Self> {
        Self::new(Speaker::User, text, sequence)
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Position in the conversation's message stream.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Identity the bridge presents to the bot service when sending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub user_name: String,
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self {
            user_id: "MyUserId".to_string(),
            user_name: "My User".to_string(),
        }
    }
}

/// A user message on its way to the bot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub conversation_id: ConversationId,
    pub from: UserIdentity,
    pub text: String,
}

/// UTC timestamp wrapper used on notices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_rejects_blank() {
        assert!(ConversationId::parse("").is_none());
        assert!(ConversationId::parse("   ").is_none());
        let id = ConversationId::parse("abc").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn test_utterance_rejects_blank_text() {
        assert!(Utterance::bot("", 1).is_none());
        assert!(Utterance::user(" \t\n", 1).is_none());

        let u = Utterance::bot("Hello", 1).unwrap();
        assert_eq!(u.speaker(), Speaker::Bot);
        assert_eq!(u.text(), "Hello");
        assert_eq!(u.sequence(), 1);
    }

    #[test]
    fn test_utterance_deserialize_rejects_blank_text() {
        let blank = r#"{"speaker":"bot","text":"  ","sequence":3}"#;
        assert!(serde_json::from_str::<Utterance>(blank).is_err());

        let json = r#"{"speaker":"user","text":"hi","sequence":3}"#;
        let u: Utterance = serde_json::from_str(json).unwrap();
        assert_eq!(u, Utterance::user("hi", 3).unwrap());
        assert_eq!(serde_json::to_string(&u).unwrap(), json);
    }

    #[test]
    fn test_watermark_ordering() {
        assert!(Watermark(3) < Watermark(5));
        assert_eq!(Watermark(5).max(Watermark(3)), Watermark(5));
    }

    #[test]
    fn test_speaker_display() {
        assert_eq!(Speaker::User.to_string(), "user");
        assert_eq!(Speaker::Bot.to_string(), "bot");
    }

    #[test]
    fn test_default_identity() {
        let id = UserIdentity::default();
        assert_eq!(id.user_id, "MyUserId");
        assert_eq!(id.user_name, "My User");
    }

    #[test]
    fn test_conversation_id_serializes_transparently() {
        let id = ConversationId::parse("C1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"C1\"");
    }

    #[test]
    fn test_session_display() {
        assert_eq!(ListenSession(4).to_string(), "listen#4");
        assert_eq!(PlaybackId(2).to_string(), "playback#2");
    }
}
