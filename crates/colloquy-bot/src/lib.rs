//! Colloquy Bot crate - conversation transport towards the bot service.
//!
//! The [`BotTransport`] trait is the narrow interface the turn coordinator
//! drives; results come back as `ConversationEvent`s on the shared bus.

pub mod brain;
pub mod memory;
pub mod mock;

use colloquy_core::types::{ConversationId, OutgoingMessage, Watermark};

pub use brain::{BotBrain, EchoBrain};
pub use memory::InMemoryBotTransport;
pub use mock::{MockBotTransport, TransportCall};

/// Conversation transport. Every method returns immediately and reports
/// its outcome on the bus from a background worker.
pub trait BotTransport: Send + Sync {
    /// Open a conversation. Publishes exactly one `ConversationStarted` or
    /// `TransportError`.
    fn create_conversation(&self);

    /// Post a user message. Publishes exactly one `MessageSent` or
    /// `TransportError`. Ordering relative to in-flight polls is not
    /// guaranteed.
    fn send(&self, message: OutgoingMessage);

    /// Fetch every utterance with a sequence strictly greater than `since`
    /// (all of them when `None`), ascending, as one `MessagesReceived`. The
    /// user's own messages are part of the stream.
    /// Polling the same watermark twice yields the same utterances.
    fn poll(&self, conversation_id: &ConversationId, since: Option<Watermark>);
}
