//! Colloquy Turn crate - turn-taking between the user, the bot and the avatar.
//!
//! The [`TurnCoordinator`] owns the [`TurnState`] machine and the
//! [`ConversationState`], consumes `ConversationEvent`s one at a time and is
//! the only caller of the recognition, transport and playback collaborators.

pub mod conversation;
pub mod coordinator;
pub mod notice;
pub mod runtime;
pub mod state;

pub use conversation::{select_newest, ConversationState};
pub use coordinator::{Collaborators, TurnCoordinator};
pub use notice::{NoticeKind, TurnNotice};
pub use runtime::CoordinatorHandle;
pub use state::{StateMachine, TurnState};
