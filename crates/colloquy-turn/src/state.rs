//! Turn-taking state machine.
//!
//! Valid transitions:
//! - Idle -> AwaitingBotReply (start, conversation being created)
//! - AwaitingBotReply -> ListeningForUser (conversation ready)
//! - ListeningForUser -> AwaitingBotReply (user utterance sent)
//! - AwaitingBotReply -> Speaking (bot reply arrived)
//! - ListeningForUser -> Speaking (unprompted bot message, e.g. a greeting)
//! - Speaking -> ListeningForUser (playback finished or failed)
//!
//! Any state falls back to Idle through [`StateMachine::reset`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use colloquy_core::error::{ColloquyError, Result};

/// Whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// No conversation running. Waiting for `start()`.
    Idle,
    /// Recognition is live; the next finalized transcript is the user's turn.
    ListeningForUser,
    /// A request to the bot is outstanding. Recognition is stopped.
    AwaitingBotReply,
    /// The avatar is speaking a bot reply.
    Speaking,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "Idle"),
            TurnState::ListeningForUser => write!(f, "ListeningForUser"),
            TurnState::AwaitingBotReply => write!(f, "AwaitingBotReply"),
            TurnState::Speaking => write!(f, "Speaking"),
        }
    }
}

impl TurnState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &TurnState) -> bool {
        matches!(
            (self, target),
            (TurnState::Idle, TurnState::AwaitingBotReply)
                | (TurnState::AwaitingBotReply, TurnState::ListeningForUser)
                | (TurnState::ListeningForUser, TurnState::AwaitingBotReply)
                | (TurnState::AwaitingBotReply, TurnState::Speaking)
                | (TurnState::ListeningForUser, TurnState::Speaking)
                | (TurnState::Speaking, TurnState::ListeningForUser)
        )
    }
}

/// Validated turn state, observable through a `watch` channel.
///
/// Clones share the same state. Only the coordinator writes to it.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<watch::Sender<TurnState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TurnState::Idle);
        Self {
            state: Arc::new(tx),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    /// Attempt to transition to `target`, returning the previous state.
    pub fn transition(&self, target: TurnState) -> Result<TurnState> {
        let mut outcome = Ok(TurnState::Idle);
        self.state.send_if_modified(|state| {
            if state.can_transition_to(&target) {
                tracing::debug!(from = %state, to = %target, "Turn state changed");
                outcome = Ok(*state);
                *state = target;
                true
            } else {
                outcome = Err(ColloquyError::InvalidTransition {
                    from: state.to_string(),
                    to: target.to_string(),
                });
                false
            }
        });
        outcome
    }

    /// Force the state back to Idle, returning the previous state.
    pub fn reset(&self) -> TurnState {
        let previous = self.state.send_replace(TurnState::Idle);
        if previous != TurnState::Idle {
            tracing::warn!(from = %previous, "Turn state reset to Idle");
        }
        previous
    }
}
