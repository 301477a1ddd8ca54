//! In-process bot service.
//!
//! Keeps one message log per conversation, numbered from 1, containing both
//! the user's messages and the bot's replies, the way a channel service
//! reports them. Replies are appended after a configurable delay so the
//! coordinator has to poll for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use colloquy_core::error::TransportFault;
use colloquy_core::types::{ConversationId, OutgoingMessage, Speaker, Utterance, Watermark};
use colloquy_core::{ConversationEvent, EventBus};

use crate::brain::BotBrain;
use crate::BotTransport;

/// Ordered message history of one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    messages: Vec<Utterance>,
}

impl ConversationLog {
    /// Append a message and return its sequence number. Blank text is skipped.
    pub fn append(&mut self, speaker: Speaker, text: &str) -> Option<u64> {
        let sequence = self.messages.len() as u64 + 1;
        let utterance = Utterance::new(speaker, text, sequence)?;
        self.messages.push(utterance);
        Some(sequence)
    }

    /// Messages strictly after `since`, ascending.
    pub fn since(&self, since: Option<Watermark>) -> Vec<Utterance> {
        let floor = since.map(|w| w.0).unwrap_or(0);
        self.messages
            .iter()
            .filter(|u| u.sequence() > floor)
            .cloned()
            .collect()
    }

    /// Watermark covering everything logged so far.
    pub fn watermark(&self) -> Watermark {
        Watermark(self.messages.len() as u64)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

type Conversations = Arc<Mutex<HashMap<ConversationId, ConversationLog>>>;

/// [`BotTransport`] backed by in-memory logs and a [`BotBrain`].
pub struct InMemoryBotTransport {
    brain: Arc<dyn BotBrain>,
    bus: EventBus<ConversationEvent>,
    conversations: Conversations,
    reply_delay: Duration,
}

impl std::fmt::Debug for InMemoryBotTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBotTransport")
            .field("conversations", &self.conversation_count())
            .field("reply_delay", &self.reply_delay)
            .finish()
    }
}

impl InMemoryBotTransport {
    pub fn new(brain: Arc<dyn BotBrain>, bus: EventBus<ConversationEvent>) -> Self {
        Self {
            brain,
            bus,
            conversations: Arc::new(Mutex::new(HashMap::new())),
            reply_delay: Duration::ZERO,
        }
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .len()
    }

    /// Snapshot of one conversation's log.
    pub fn transcript(&self, conversation_id: &ConversationId) -> Option<ConversationLog> {
        self.conversations
            .lock()
            .expect("conversation mutex poisoned")
            .get(conversation_id)
            .cloned()
    }
}

impl BotTransport for InMemoryBotTransport {
    fn create_conversation(&self) {
        let conversations = Arc::clone(&self.conversations);
        let brain = Arc::clone(&self.brain);
        let bus = self.bus.clone();

        tokio::spawn(async move {
            let raw = Uuid::new_v4().to_string();
            let Some(id) = ConversationId::parse(raw.clone()) else {
                bus.publish(ConversationEvent::TransportError {
                    fault: TransportFault::InvalidConversationId,
                });
                return;
            };

            let mut log = ConversationLog::default();
            if let Some(greeting) = brain.greeting() {
                log.append(Speaker::Bot, &greeting);
            }
            conversations
                .lock()
                .expect("conversation mutex poisoned")
                .insert(id, log);

            tracing::info!(conversation_id = %raw, "Conversation created");
            bus.publish(ConversationEvent::ConversationStarted {
                conversation_id: raw,
            });
        });
    }

    fn send(&self, message: OutgoingMessage) {
        let conversations = Arc::clone(&self.conversations);
        let brain = Arc::clone(&self.brain);
        let bus = self.bus.clone();
        let delay = self.reply_delay;

        tokio::spawn(async move {
            let appended = {
                let mut guard = conversations.lock().expect("conversation mutex poisoned");
                match guard.get_mut(&message.conversation_id) {
                    None => Err(TransportFault::UnknownConversation(
                        message.conversation_id.to_string(),
                    )),
                    Some(log) => log
                        .append(Speaker::User, &message.text)
                        .ok_or_else(|| TransportFault::Send("empty message".to_string())),
                }
            };

            let sequence = match appended {
                Ok(sequence) => sequence,
                Err(fault) => {
                    tracing::warn!(error = %fault, "Send rejected");
                    bus.publish(ConversationEvent::TransportError { fault });
                    return;
                }
            };

            tracing::debug!(
                conversation_id = %message.conversation_id,
                sequence,
                user_id = %message.from.user_id,
                "Message sent"
            );
            bus.publish(ConversationEvent::MessageSent);

            let replies = brain.reply(&message.from, &message.text);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut guard = conversations.lock().expect("conversation mutex poisoned");
            if let Some(log) = guard.get_mut(&message.conversation_id) {
                for reply in &replies {
                    log.append(Speaker::Bot, reply);
                }
            }
        });
    }

    fn poll(&self, conversation_id: &ConversationId, since: Option<Watermark>) {
        let conversations = Arc::clone(&self.conversations);
        let bus = self.bus.clone();
        let conversation_id = conversation_id.clone();

        tokio::spawn(async move {
            let result = {
                let guard = conversations.lock().expect("conversation mutex poisoned");
                guard
                    .get(&conversation_id)
                    .map(|log| (log.since(since), log.watermark()))
            };

            match result {
                Some((utterances, watermark)) => {
                    tracing::debug!(
                        conversation_id = %conversation_id,
                        count = utterances.len(),
                        %watermark,
                        "Messages polled"
                    );
                    bus.publish(ConversationEvent::MessagesReceived {
                        utterances,
                        watermark,
                    });
                }
                None => {
                    bus.publish(ConversationEvent::TransportError {
                        fault: TransportFault::UnknownConversation(conversation_id.to_string()),
                    });
                }
            }
        });
    }
}
