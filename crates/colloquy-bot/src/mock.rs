//! Recording transport for coordinator tests.

use std::sync::{Arc, Mutex};

use colloquy_core::types::{ConversationId, OutgoingMessage, Watermark};

use crate::BotTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateConversation,
    Send(OutgoingMessage),
    Poll(ConversationId, Option<Watermark>),
}

/// Transport that records every request and publishes nothing.
#[derive(Debug, Clone, Default)]
pub struct MockBotTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl MockBotTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("mock mutex poisoned").clear();
    }

    /// Texts of every sent message, in order.
    pub fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Send(m) => Some(m.text),
                _ => None,
            })
            .collect()
    }

    /// Watermarks passed to `poll`, in order.
    pub fn polls(&self) -> Vec<Option<Watermark>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TransportCall::Poll(_, since) => Some(since),
                _ => None,
            })
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, TransportCall::CreateConversation))
            .count()
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().expect("mock mutex poisoned").push(call);
    }
}

impl BotTransport for MockBotTransport {
    fn create_conversation(&self) {
        self.record(TransportCall::CreateConversation);
    }

    fn send(&self, message: OutgoingMessage) {
        self.record(TransportCall::Send(message));
    }

    fn poll(&self, conversation_id: &ConversationId, since: Option<Watermark>) {
        self.record(TransportCall::Poll(conversation_id.clone(), since));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::types::UserIdentity;

    #[test]
    fn test_records_calls_in_order() {
        let transport = MockBotTransport::new();
        let id = ConversationId::parse("C1").unwrap();

        transport.create_conversation();
        transport.send(OutgoingMessage {
            conversation_id: id.clone(),
            from: UserIdentity::default(),
            text: "hi".into(),
        });
        transport.poll(&id, Some(Watermark(2)));

        assert_eq!(transport.create_count(), 1);
        assert_eq!(transport.sent(), vec!["hi".to_string()]);
        assert_eq!(transport.polls(), vec![Some(Watermark(2))]);
        assert_eq!(transport.calls().len(), 3);

        transport.clear();
        assert!(transport.calls().is_empty());
    }
}
