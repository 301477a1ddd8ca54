//! Channel-fed continuous recognizer.
//!
//! The recognition engine (or a console, or a test) pushes
//! [`RecognizerInput`] values into an unbounded channel. A background worker
//! filters them and, while a listen session is live, publishes finalized
//! transcripts on the bus. Publishing happens under the same lock `stop`
//! takes, so nothing is published once `stop` has returned.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use colloquy_core::config::SpeechConfig;
use colloquy_core::types::ListenSession;
use colloquy_core::{ConversationEvent, EventBus};

use crate::SpeechRecognitionSource;

/// One result from the underlying recognition engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerInput {
    /// Hypothesis that may still be revised.
    Interim(String),
    /// The engine will not revise this text further.
    Final(String),
    /// The engine gave up (bad credentials, network loss).
    Canceled(String),
}

/// Continuous recognizer driven by a channel of engine results.
pub struct ChannelRecognizer {
    active: Arc<Mutex<Option<ListenSession>>>,
    bus: EventBus<ConversationEvent>,
    config: SpeechConfig,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for ChannelRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRecognizer")
            .field("active", &self.active_session())
            .field("region", &self.config.region)
            .field("language", &self.config.language)
            .finish()
    }
}

impl ChannelRecognizer {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(
        config: SpeechConfig,
        bus: EventBus<ConversationEvent>,
        input: mpsc::UnboundedReceiver<RecognizerInput>,
    ) -> Self {
        let active = Arc::new(Mutex::new(None));
        let worker = tokio::spawn(run_worker(input, Arc::clone(&active), bus.clone()));
        tracing::info!(
            region = %config.region,
            language = %config.language,
            "Speech recognizer ready"
        );
        Self {
            active,
            bus,
            config,
            worker,
        }
    }
}

async fn run_worker(
    mut input: mpsc::UnboundedReceiver<RecognizerInput>,
    active: Arc<Mutex<Option<ListenSession>>>,
    bus: EventBus<ConversationEvent>,
) {
    while let Some(item) = input.recv().await {
        let guard = active.lock().expect("recognizer mutex poisoned");
        let Some(session) = *guard else {
            tracing::debug!("Recognizer stopped, discarding engine result");
            continue;
        };

        match item {
            RecognizerInput::Interim(text) => {
                tracing::trace!(%session, len = text.len(), "Interim hypothesis dropped");
            }
            RecognizerInput::Final(text) if text.trim().is_empty() => {
                tracing::debug!(%session, "NOMATCH: speech could not be recognized");
            }
            RecognizerInput::Final(text) => {
                tracing::info!(%session, text = %text, "Recognized");
                bus.publish(ConversationEvent::Recognized { session, text });
            }
            RecognizerInput::Canceled(reason) => {
                tracing::warn!(%session, reason = %reason, "Recognition canceled");
                bus.publish(ConversationEvent::RecognitionError { reason });
            }
        }
        drop(guard);
    }
    tracing::debug!("Recognizer input closed");
}

impl SpeechRecognitionSource for ChannelRecognizer {
    fn start_continuous(&self, session: ListenSession) {
        if !self.config.has_credentials() {
            tracing::warn!("Speech recognizer has no subscription key");
            self.bus.publish(ConversationEvent::RecognitionError {
                reason: "missing service credentials".to_string(),
            });
            return;
        }

        let mut guard = self.active.lock().expect("recognizer mutex poisoned");
        match *guard {
            Some(current) if current == session => {
                tracing::trace!(%session, "Recognizer already running");
            }
            previous => {
                tracing::debug!(?previous, %session, "Continuous recognition started");
                *guard = Some(session);
            }
        }
    }

    fn stop(&self) {
        let mut guard = self.active.lock().expect("recognizer mutex poisoned");
        if let Some(session) = guard.take() {
            tracing::debug!(%session, "Continuous recognition stopped");
        }
    }

    fn active_session(&self) -> Option<ListenSession> {
        *self.active.lock().expect("recognizer mutex poisoned")
    }
}

impl Drop for ChannelRecognizer {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
