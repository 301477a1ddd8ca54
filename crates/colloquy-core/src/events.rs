use serde::{Deserialize, Serialize};

use crate::error::TransportFault;
use crate::types::{ListenSession, PlaybackId, Utterance, Watermark};

/// Every input the turn coordinator reacts to.
///
/// Collaborators publish these on the shared [`EventBus`](crate::bus::EventBus)
/// from their own workers; the coordinator consumes them one at a time.
/// Events are transient and never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConversationEvent {
    // =========================================================================
    // Bot transport
    // =========================================================================
    /// The bot service created a conversation. The id is passed through raw;
    /// an empty id is rejected by the coordinator.
    ConversationStarted { conversation_id: String },

    /// A user message was accepted by the bot service.
    MessageSent,

    /// A poll returned the utterances after the last known watermark,
    /// ordered by sequence ascending, plus the newest watermark.
    MessagesReceived {
        utterances: Vec<Utterance>,
        watermark: Watermark,
    },

    /// Conversation creation, send or poll failed.
    TransportError { fault: TransportFault },

    // =========================================================================
    // Speech recognition
    // =========================================================================
    /// A finalized transcript from the given listen session.
    Recognized { session: ListenSession, text: String },

    /// The recognizer was cancelled by the engine (credentials, network).
    RecognitionError { reason: String },

    // =========================================================================
    // Playback
    // =========================================================================
    /// A play request ran to completion.
    PlaybackFinished { playback: PlaybackId },

    /// Synthesis or playback failed for a play request.
    SynthesisFailed { playback: PlaybackId, reason: String },

    // =========================================================================
    // Coordinator timers
    // =========================================================================
    /// A delayed re-poll for a bot reply is due.
    ReplyPollDue { attempt: u32 },
}

impl ConversationEvent {
    /// Returns a stable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ConversationEvent::ConversationStarted { .. } => "conversation_started",
            ConversationEvent::MessageSent => "message_sent",
            ConversationEvent::MessagesReceived { .. } => "messages_received",
            ConversationEvent::TransportError { .. } => "transport_error",
            ConversationEvent::Recognized { .. } => "recognized",
            ConversationEvent::RecognitionError { .. } => "recognition_error",
            ConversationEvent::PlaybackFinished { .. } => "playback_finished",
            ConversationEvent::SynthesisFailed { .. } => "synthesis_failed",
            ConversationEvent::ReplyPollDue { .. } => "reply_poll_due",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let cases: Vec<(ConversationEvent, &str)> = vec![
            (
                ConversationEvent::ConversationStarted {
                    conversation_id: "C1".into(),
                },
                "conversation_started",
            ),
            (ConversationEvent::MessageSent, "message_sent"),
            (
                ConversationEvent::MessagesReceived {
                    utterances: vec![],
                    watermark: Watermark(0),
                },
                "messages_received",
            ),
            (
                ConversationEvent::TransportError {
                    fault: TransportFault::InvalidConversationId,
                },
                "transport_error",
            ),
            (
                ConversationEvent::Recognized {
                    session: ListenSession(1),
                    text: "hi".into(),
                },
                "recognized",
            ),
            (
                ConversationEvent::RecognitionError {
                    reason: "no mic".into(),
                },
                "recognition_error",
            ),
            (
                ConversationEvent::PlaybackFinished {
                    playback: PlaybackId(1),
                },
                "playback_finished",
            ),
            (
                ConversationEvent::SynthesisFailed {
                    playback: PlaybackId(1),
                    reason: "quota".into(),
                },
                "synthesis_failed",
            ),
            (
                ConversationEvent::ReplyPollDue { attempt: 2 },
                "reply_poll_due",
            ),
        ];

        for (event, expected) in cases {
            assert_eq!(event.event_name(), expected);
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = ConversationEvent::MessagesReceived {
            utterances: vec![Utterance::bot("Hello", 1).unwrap()],
            watermark: Watermark(1),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("MessagesReceived"));
        assert!(json.contains("Hello"));

        let back: ConversationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
