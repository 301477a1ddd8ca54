//! The turn coordinator.
//!
//! `TurnCoordinator` is the only component that starts or stops recognition,
//! talks to the bot transport and triggers playback. It is driven one event
//! at a time by the run loop in [`crate::runtime`], so every handler takes
//! `&mut self` and never blocks: collaborators do their work on their own
//! workers and answer with events on the bus.

use std::sync::Arc;

use tokio::task::JoinHandle;

use colloquy_bot::BotTransport;
use colloquy_core::config::TurnConfig;
use colloquy_core::error::{ColloquyError, Result, TransportFault};
use colloquy_core::types::{
    ConversationId, ListenSession, OutgoingMessage, PlaybackId, Speaker, UserIdentity, Utterance,
    Watermark,
};
use colloquy_core::{ConversationEvent, EventBus};
use colloquy_speech::{AnimationSink, AudioPlaybackSink, SpeechRecognitionSource, TalkVariant};

use crate::conversation::{select_newest, ConversationState};
use crate::notice::{NoticeKind, TurnNotice};
use crate::state::{StateMachine, TurnState};

/// Collaborators the coordinator drives. Constructed once by the caller.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn SpeechRecognitionSource>,
    pub transport: Arc<dyn BotTransport>,
    pub playback: Arc<dyn AudioPlaybackSink>,
    pub animator: Arc<dyn AnimationSink>,
}

/// Single authority over turn state and conversation state.
pub struct TurnCoordinator {
    recognizer: Arc<dyn SpeechRecognitionSource>,
    transport: Arc<dyn BotTransport>,
    playback: Arc<dyn AudioPlaybackSink>,
    animator: Arc<dyn AnimationSink>,
    bus: EventBus<ConversationEvent>,
    notices: EventBus<TurnNotice>,
    identity: UserIdentity,
    config: TurnConfig,
    state: StateMachine,
    conversation: ConversationState,
    listen_session: Option<ListenSession>,
    sessions_opened: u64,
    playback_id: Option<PlaybackId>,
    playbacks_issued: u64,
    reply_polls: u32,
    repoll_timer: Option<JoinHandle<()>>,
    /// The user's last message has not been answered by a spoken reply yet.
    reply_pending: bool,
    /// The transport confirmed the pending user message.
    message_acked: bool,
    /// Sequence of the pending user message once a poll has returned it.
    user_sequence: Option<u64>,
    /// Sequence of the last bot utterance handed to playback.
    last_spoken: Option<u64>,
}

impl std::fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("state", &self.state.current())
            .field("conversation", &self.conversation)
            .field("listen_session", &self.listen_session)
            .field("playback_id", &self.playback_id)
            .field("reply_polls", &self.reply_polls)
            .field("reply_pending", &self.reply_pending)
            .finish()
    }
}

impl TurnCoordinator {
    /// Create an idle coordinator.
    ///
    /// `bus` is the event bus the collaborators publish on; the coordinator
    /// also publishes its own re-poll timers there.
    pub fn new(
        collaborators: Collaborators,
        bus: EventBus<ConversationEvent>,
        identity: UserIdentity,
        config: TurnConfig,
    ) -> Self {
        Self {
            recognizer: collaborators.recognizer,
            transport: collaborators.transport,
            playback: collaborators.playback,
            animator: collaborators.animator,
            bus,
            notices: EventBus::new(),
            identity,
            config,
            state: StateMachine::new(),
            conversation: ConversationState::new(),
            listen_session: None,
            sessions_opened: 0,
            playback_id: None,
            playbacks_issued: 0,
            reply_polls: 0,
            repoll_timer: None,
            reply_pending: false,
            message_acked: false,
            user_sequence: None,
            last_spoken: None,
        }
    }

    pub fn current_state(&self) -> TurnState {
        self.state.current()
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.state
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn notices(&self) -> &EventBus<TurnNotice> {
        &self.notices
    }

    pub fn bus(&self) -> &EventBus<ConversationEvent> {
        &self.bus
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Begin (or resume) the conversation.
    ///
    /// Creates a conversation on first use. After a reset the existing
    /// conversation is reused and listening resumes straight away.
    pub fn start(&mut self) -> Result<()> {
        if self.state.current() != TurnState::Idle {
            return Err(ColloquyError::AlreadyStarted);
        }
        self.transition(TurnState::AwaitingBotReply)?;

        match self.conversation.conversation_id().cloned() {
            Some(id) => {
                tracing::info!(conversation_id = %id, "Resuming conversation");
                self.transition(TurnState::ListeningForUser)?;
                self.start_listening();
            }
            None => {
                tracing::info!("Creating conversation");
                self.transport.create_conversation();
            }
        }
        Ok(())
    }

    /// Dispatch one bus event to its handler.
    pub fn handle_event(&mut self, event: ConversationEvent) -> Result<()> {
        tracing::trace!(event = event.event_name(), state = %self.state.current(), "Handling event");
        match event {
            ConversationEvent::ConversationStarted { conversation_id } => {
                self.on_conversation_started(&conversation_id)
            }
            ConversationEvent::MessageSent => self.on_message_sent(),
            ConversationEvent::MessagesReceived {
                utterances,
                watermark,
            } => self.on_messages_received(&utterances, watermark),
            ConversationEvent::TransportError { fault } => {
                self.on_transport_error(fault);
                Ok(())
            }
            ConversationEvent::Recognized { session, text } => {
                self.on_recognized_utterance(session, &text)
            }
            ConversationEvent::RecognitionError { reason } => {
                self.on_recognition_error(&reason);
                Ok(())
            }
            ConversationEvent::PlaybackFinished { playback } => self.on_playback_finished(playback),
            ConversationEvent::SynthesisFailed { playback, reason } => {
                self.on_synthesis_failed(playback, &reason)
            }
            ConversationEvent::ReplyPollDue { attempt } => self.on_reply_poll_due(attempt),
        }
    }

    /// A finalized transcript from recognition session `session`.
    pub fn on_recognized_utterance(&mut self, session: ListenSession, text: &str) -> Result<()> {
        let state = self.state.current();
        if state != TurnState::ListeningForUser {
            tracing::debug!(%session, %state, "Recognized text outside user turn, dropped");
            return Ok(());
        }
        if self.listen_session != Some(session) {
            tracing::debug!(%session, "Recognized text from stale session, dropped");
            return Ok(());
        }
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(%session, "Empty transcript, dropped");
            return Ok(());
        }
        let Some(conversation_id) = self.conversation.conversation_id().cloned() else {
            self.fail(ColloquyError::Transport(TransportFault::InvalidConversationId));
            return Ok(());
        };

        self.stop_listening();
        self.transition(TurnState::AwaitingBotReply)?;
        self.cancel_repoll();
        self.reply_polls = 0;
        self.reply_pending = true;
        self.message_acked = false;
        self.user_sequence = None;

        tracing::info!(conversation_id = %conversation_id, chars = text.len(), "User turn sent");
        self.notify(NoticeKind::UserSaid {
            text: text.to_string(),
        });
        self.transport.send(OutgoingMessage {
            conversation_id,
            from: self.identity.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    /// The bot service assigned a conversation id.
    pub fn on_conversation_started(&mut self, raw_id: &str) -> Result<()> {
        if let Some(existing) = self.conversation.conversation_id() {
            tracing::warn!(
                conversation_id = %existing,
                ignored = raw_id,
                "Conversation already assigned, ignoring new id"
            );
            return Ok(());
        }
        let state = self.state.current();
        if state != TurnState::AwaitingBotReply {
            tracing::debug!(%state, "Conversation started outside start-up, ignored");
            return Ok(());
        }

        let Some(id) = ConversationId::parse(raw_id) else {
            self.fail(ColloquyError::Transport(TransportFault::InvalidConversationId));
            return Ok(());
        };
        tracing::info!(conversation_id = %id, "Conversation started");
        self.conversation.assign(id);

        self.transition(TurnState::ListeningForUser)?;
        self.start_listening();
        self.poll();
        Ok(())
    }

    /// The transport accepted the user's message; ask for the reply.
    ///
    /// While the avatar is speaking the poll is deferred until playback
    /// finishes.
    pub fn on_message_sent(&mut self) -> Result<()> {
        if !self.reply_pending {
            tracing::debug!(state = %self.state.current(), "Message sent with no reply owed, ignored");
            return Ok(());
        }
        self.message_acked = true;
        if self.state.current() == TurnState::Speaking {
            tracing::debug!("Message sent while speaking, reply fetched after playback");
            return Ok(());
        }
        self.poll();
        Ok(())
    }

    /// A poll result.
    ///
    /// Results at or behind the stored watermark are duplicates and never
    /// replayed. Otherwise the utterance at the received watermark is
    /// selected; a bot utterance is spoken. The watermark advances whoever
    /// the speaker is. While a reply is owed and none is selected, a re-poll
    /// is scheduled.
    pub fn on_messages_received(
        &mut self,
        utterances: &[Utterance],
        watermark: Watermark,
    ) -> Result<()> {
        let state = self.state.current();
        if !matches!(state, TurnState::ListeningForUser | TurnState::AwaitingBotReply) {
            // The poll issued when playback ends, or the next user turn, re-fetches these.
            tracing::debug!(%state, %watermark, "Poll result outside conversation turn, ignored");
            return Ok(());
        }

        if !self.conversation.is_newer(watermark) {
            tracing::debug!(%watermark, stored = ?self.conversation.watermark(), "Stale poll result");
            if self.reply_pending {
                self.schedule_repoll();
            }
            return Ok(());
        }

        let selected = match select_newest(utterances, watermark) {
            Ok(selected) => selected.cloned(),
            Err(fault) => {
                self.fail(ColloquyError::Transport(fault));
                return Ok(());
            }
        };
        self.conversation.advance(watermark);
        tracing::debug!(%watermark, count = utterances.len(), "Watermark advanced");
        self.note_user_echo(utterances);

        match selected {
            Some(utterance) if utterance.speaker() == Speaker::Bot => self.speak(&utterance),
            _ => {
                if self.reply_pending {
                    self.schedule_repoll();
                }
                Ok(())
            }
        }
    }

    /// Playback `playback` ran to completion.
    pub fn on_playback_finished(&mut self, playback: PlaybackId) -> Result<()> {
        if !self.is_current_playback(playback) {
            return Ok(());
        }
        tracing::debug!(%playback, "Playback finished");
        self.finish_speaking()
    }

    /// Synthesis for `playback` failed. Counts as a finished playback so the
    /// conversation goes back to the user.
    pub fn on_synthesis_failed(&mut self, playback: PlaybackId, reason: &str) -> Result<()> {
        if !self.is_current_playback(playback) {
            return Ok(());
        }
        tracing::warn!(%playback, reason, "Speech synthesis failed, skipping reply");
        self.notify(NoticeKind::Error {
            message: ColloquyError::Synthesis(reason.to_string()).to_string(),
        });
        self.finish_speaking()
    }

    pub fn on_transport_error(&mut self, fault: TransportFault) {
        self.fail(ColloquyError::Transport(fault));
    }

    pub fn on_recognition_error(&mut self, reason: &str) {
        self.fail(ColloquyError::Recognition(reason.to_string()));
    }

    /// A scheduled re-poll is due. Only the latest attempt counts.
    pub fn on_reply_poll_due(&mut self, attempt: u32) -> Result<()> {
        if !self.reply_pending
            || self.state.current() == TurnState::Speaking
            || attempt != self.reply_polls
        {
            tracing::debug!(attempt, "Stale re-poll, ignored");
            return Ok(());
        }
        self.repoll_timer = None;
        self.poll();
        Ok(())
    }

    /// Stop every collaborator and go idle. Used when the run loop ends.
    pub fn shutdown(&mut self) {
        self.halt();
        let previous = self.state.reset();
        if previous != TurnState::Idle {
            self.notify(NoticeKind::StateChanged {
                from: previous,
                to: TurnState::Idle,
            });
        }
        tracing::info!("Turn coordinator stopped");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn transition(&mut self, target: TurnState) -> Result<()> {
        let from = self.state.transition(target)?;
        self.notify(NoticeKind::StateChanged { from, to: target });
        Ok(())
    }

    fn notify(&self, kind: NoticeKind) {
        self.notices.publish(TurnNotice::new(kind));
    }

    fn start_listening(&mut self) {
        self.sessions_opened += 1;
        let session = ListenSession(self.sessions_opened);
        self.listen_session = Some(session);
        tracing::debug!(%session, "Recognition started");
        self.recognizer.start_continuous(session);
    }

    fn stop_listening(&mut self) {
        if let Some(session) = self.listen_session.take() {
            tracing::debug!(%session, "Recognition stopped");
        }
        self.recognizer.stop();
    }

    fn poll(&mut self) {
        if let Some(id) = self.conversation.conversation_id() {
            tracing::debug!(conversation_id = %id, since = ?self.conversation.watermark(), "Polling for messages");
            self.transport.poll(id, self.conversation.watermark());
        }
    }

    fn schedule_repoll(&mut self) {
        self.reply_polls += 1;
        if self.reply_polls > self.config.max_reply_polls {
            let polls = self.config.max_reply_polls;
            self.fail(ColloquyError::Transport(TransportFault::ReplyTimeout { polls }));
            return;
        }

        let attempt = self.reply_polls;
        let delay = self.config.repoll_interval();
        let bus = self.bus.clone();
        self.cancel_repoll();
        self.repoll_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.publish(ConversationEvent::ReplyPollDue { attempt });
        }));
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "No bot reply yet, re-poll scheduled");
    }

    fn cancel_repoll(&mut self) {
        if let Some(timer) = self.repoll_timer.take() {
            timer.abort();
        }
    }

    /// Record the newest user message a poll returned. A user message after
    /// the last spoken reply still owes an answer.
    fn note_user_echo(&mut self, utterances: &[Utterance]) {
        let newest = utterances
            .iter()
            .filter(|u| u.speaker() == Speaker::User)
            .map(Utterance::sequence)
            .max();
        let Some(sequence) = newest else {
            return;
        };
        if self.last_spoken.map_or(true, |spoken| sequence > spoken) {
            self.user_sequence = Some(sequence);
            self.reply_pending = true;
        }
    }

    /// Whether a bot utterance at `sequence` answers the pending user
    /// message. Without an echo of that message only the send ack counts.
    fn answers_user_turn(&self, sequence: u64) -> bool {
        match self.user_sequence {
            Some(user) => sequence > user,
            None => self.message_acked,
        }
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        let text = utterance.text();
        if self.state.current() == TurnState::ListeningForUser {
            self.stop_listening();
        }
        self.transition(TurnState::Speaking)?;
        self.cancel_repoll();
        self.reply_polls = 0;
        self.last_spoken = Some(utterance.sequence());
        if self.reply_pending && self.answers_user_turn(utterance.sequence()) {
            self.reply_pending = false;
        }

        self.playbacks_issued += 1;
        let playback = PlaybackId(self.playbacks_issued);
        self.playback_id = Some(playback);

        tracing::info!(%playback, chars = text.len(), "Speaking bot reply");
        self.notify(NoticeKind::BotSaid {
            text: text.to_string(),
        });
        self.playback.play(playback, text);
        self.animator.start_talking(TalkVariant::random());
        Ok(())
    }

    fn finish_speaking(&mut self) -> Result<()> {
        self.playback_id = None;
        self.animator.stop_talking();
        self.transition(TurnState::ListeningForUser)?;
        self.start_listening();
        // Poll results are dropped while speaking; catch up on them.
        self.poll();
        Ok(())
    }

    fn is_current_playback(&self, playback: PlaybackId) -> bool {
        if self.state.current() != TurnState::Speaking || self.playback_id != Some(playback) {
            tracing::debug!(%playback, current = ?self.playback_id, "Stale playback event, dropped");
            return false;
        }
        true
    }

    /// Stop recognition, playback, animation and timers.
    fn halt(&mut self) {
        if self.state.current() == TurnState::Speaking {
            self.animator.stop_talking();
        }
        self.stop_listening();
        self.playback.stop();
        self.playback_id = None;
        self.cancel_repoll();
        self.reply_polls = 0;
        self.reply_pending = false;
        self.message_acked = false;
        self.user_sequence = None;
    }

    /// Report a non-fatal error and fall back to Idle. No retry.
    fn fail(&mut self, error: ColloquyError) {
        tracing::warn!(error = %error, state = %self.state.current(), "Conversation turn failed");
        self.notify(NoticeKind::Error {
            message: error.to_string(),
        });
        self.halt();
        let previous = self.state.reset();
        if previous != TurnState::Idle {
            self.notify(NoticeKind::StateChanged {
                from: previous,
                to: TurnState::Idle,
            });
        }
    }
}

impl Drop for TurnCoordinator {
    fn drop(&mut self) {
        self.cancel_repoll();
    }
}
