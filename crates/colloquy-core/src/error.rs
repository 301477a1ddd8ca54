use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the Colloquy system.
///
/// The taxonomy mirrors the three external collaborators: recognition,
/// bot transport and synthesis. None of them is fatal to the process; the
/// turn coordinator logs the error and falls back to `Idle`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ColloquyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportFault),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Conversation already started")]
    AlreadyStarted,

    #[error("Invalid turn transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Event channel closed")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

/// Failures reported by a bot transport, or detected by the coordinator
/// while interpreting transport results.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFault {
    #[error("conversation creation failed: {0}")]
    ConversationCreation(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("poll failed: {0}")]
    Poll(String),

    #[error("missing or empty conversation id")]
    InvalidConversationId,

    #[error("watermark {watermark} outside received range {first}..={last}")]
    WatermarkOutOfRange { watermark: u64, first: u64, last: u64 },

    #[error("unknown conversation: {0}")]
    UnknownConversation(String),

    #[error("no bot reply after {polls} polls")]
    ReplyTimeout { polls: u32 },
}

impl From<toml::de::Error> for ColloquyError {
    fn from(err: toml::de::Error) -> Self {
        ColloquyError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ColloquyError {
    fn from(err: toml::ser::Error) -> Self {
        ColloquyError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ColloquyError {
    fn from(err: serde_json::Error) -> Self {
        ColloquyError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Colloquy operations.
pub type Result<T> = std::result::Result<T, ColloquyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ColloquyError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_transport_fault_display() {
        let cases: Vec<(TransportFault, &str)> = vec![
            (
                TransportFault::ConversationCreation("403".into()),
                "conversation creation failed: 403",
            ),
            (TransportFault::Send("timeout".into()), "send failed: timeout"),
            (TransportFault::Poll("reset".into()), "poll failed: reset"),
            (
                TransportFault::InvalidConversationId,
                "missing or empty conversation id",
            ),
            (
                TransportFault::WatermarkOutOfRange {
                    watermark: 7,
                    first: 1,
                    last: 3,
                },
                "watermark 7 outside received range 1..=3",
            ),
            (
                TransportFault::UnknownConversation("abc".into()),
                "unknown conversation: abc",
            ),
            (
                TransportFault::ReplyTimeout { polls: 20 },
                "no bot reply after 20 polls",
            ),
        ];

        for (fault, expected) in cases {
            assert_eq!(fault.to_string(), expected);
        }
    }

    #[test]
    fn test_transport_fault_wraps_into_colloquy_error() {
        let err: ColloquyError = TransportFault::InvalidConversationId.into();
        assert!(matches!(
            err,
            ColloquyError::Transport(TransportFault::InvalidConversationId)
        ));
        assert_eq!(
            err.to_string(),
            "Transport error: missing or empty conversation id"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ColloquyError::InvalidTransition {
            from: "Idle".into(),
            to: "Speaking".into(),
        };
        assert_eq!(err.to_string(), "Invalid turn transition: Idle -> Speaking");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ColloquyError = io_err.into();
        assert!(matches!(err, ColloquyError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let colloquy_err: ColloquyError = err.unwrap_err().into();
        assert!(matches!(colloquy_err, ColloquyError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let colloquy_err: ColloquyError = err.unwrap_err().into();
        assert!(matches!(colloquy_err, ColloquyError::Serialization(_)));
    }

    #[test]
    fn test_transport_fault_serialization() {
        let fault = TransportFault::ReplyTimeout { polls: 3 };
        let json = serde_json::to_string(&fault).unwrap();
        assert!(json.contains("reply_timeout"));
        let back: TransportFault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }
}
