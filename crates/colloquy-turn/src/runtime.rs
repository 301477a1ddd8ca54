//! Serial run loop for the coordinator.
//!
//! The coordinator is moved into one task that consumes the event bus and a
//! command channel. Nothing else touches it, so turn state is only ever
//! written from that task.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use colloquy_core::error::{ColloquyError, Result};
use colloquy_core::{ConversationEvent, EventBus, Subscription};

use crate::coordinator::TurnCoordinator;
use crate::notice::TurnNotice;
use crate::state::TurnState;

enum Command {
    Start(oneshot::Sender<Result<()>>),
    Shutdown,
}

/// Handle to a running coordinator.
#[derive(Debug)]
pub struct CoordinatorHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<TurnState>,
    notices: EventBus<TurnNotice>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start(_) => write!(f, "Start"),
            Command::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl TurnCoordinator {
    /// Move the coordinator onto its own task and return a handle to it.
    ///
    /// The bus subscription is taken before this returns, so no event
    /// published afterwards is missed.
    pub fn spawn(self) -> CoordinatorHandle {
        let events = self.bus().subscribe();
        let state = self.state_machine().subscribe();
        let notices = self.notices().clone();
        let (commands, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(self, events, command_rx));
        CoordinatorHandle {
            commands,
            state,
            notices,
            task,
        }
    }
}

async fn run(
    mut coordinator: TurnCoordinator,
    mut events: Subscription<ConversationEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    tracing::info!("Turn coordinator running");
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Start(reply)) => {
                    let _ = reply.send(coordinator.start());
                }
                Some(Command::Shutdown) | None => break,
            },
            event = events.recv() => match event {
                Some(event) => {
                    let name = event.event_name();
                    if let Err(e) = coordinator.handle_event(event) {
                        tracing::warn!(event = name, error = %e, "Event handling failed");
                    }
                }
                None => {
                    tracing::debug!("Event bus closed");
                    break;
                }
            },
        }
    }
    coordinator.shutdown();
    coordinator.notices().close();
}

impl CoordinatorHandle {
    /// Ask the coordinator to start (or resume) the conversation.
    pub async fn start(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Start(tx))
            .map_err(|_| ColloquyError::ShuttingDown)?;
        rx.await.map_err(|_| ColloquyError::ShuttingDown)?
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Wait until the coordinator reaches `target`.
    pub async fn wait_for(&self, target: TurnState) -> Result<()> {
        let mut rx = self.state.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| ColloquyError::ChannelClosed)
    }

    pub fn subscribe_notices(&self) -> Subscription<TurnNotice> {
        self.notices.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the coordinator and wait for its task to end.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|e| {
            tracing::error!(error = %e, "Coordinator task failed");
            ColloquyError::ChannelClosed
        })
    }
}
