//! Full conversation loop over the real bus with in-process collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use colloquy_bot::{EchoBrain, InMemoryBotTransport};
use colloquy_core::config::{SpeechConfig, SynthesisConfig, TurnConfig};
use colloquy_core::error::Result;
use colloquy_core::types::UserIdentity;
use colloquy_core::{EventBus, Subscription};
use colloquy_speech::{
    AnimationCall, AudioOutput, ChannelRecognizer, RecognizerInput, RecordingAnimator,
    SilentSynthesizer, SpeechRecognitionSource, SynthesizingPlayback,
};
use colloquy_turn::{
    Collaborators, CoordinatorHandle, NoticeKind, TurnCoordinator, TurnNotice, TurnState,
};

#[derive(Default)]
struct CapturingOutput {
    spoken: Mutex<Vec<String>>,
}

impl AudioOutput for CapturingOutput {
    fn render(&self, text: &str, _samples: &[f32], _sample_rate: u32) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Harness {
    handle: CoordinatorHandle,
    notices: Subscription<TurnNotice>,
    input: mpsc::UnboundedSender<RecognizerInput>,
    recognizer: Arc<ChannelRecognizer>,
    output: Arc<CapturingOutput>,
    animator: RecordingAnimator,
}

fn harness(subscription_key: &str, ms_per_char: u32) -> Harness {
    let bus = EventBus::new();
    let (input, input_rx) = mpsc::unbounded_channel();

    let recognizer = Arc::new(ChannelRecognizer::spawn(
        SpeechConfig {
            subscription_key: subscription_key.to_string(),
            ..SpeechConfig::default()
        },
        bus.clone(),
        input_rx,
    ));
    let transport = Arc::new(
        InMemoryBotTransport::new(Arc::new(EchoBrain::with_greeting("Hello")), bus.clone())
            .with_reply_delay(Duration::from_millis(30)),
    );
    let output = Arc::new(CapturingOutput::default());
    let playback = Arc::new(SynthesizingPlayback::new(
        Arc::new(SilentSynthesizer::new(&SynthesisConfig {
            sample_rate: 16_000,
            ms_per_char,
        })),
        output.clone(),
        bus.clone(),
    ));
    let animator = RecordingAnimator::new();

    let coordinator = TurnCoordinator::new(
        Collaborators {
            recognizer: recognizer.clone(),
            transport,
            playback,
            animator: Arc::new(animator.clone()),
        },
        bus,
        UserIdentity::default(),
        TurnConfig {
            repoll_interval_ms: 10,
            max_reply_polls: 100,
        },
    );
    let handle = coordinator.spawn();
    let notices = handle.subscribe_notices();

    Harness {
        handle,
        notices,
        input,
        recognizer,
        output,
        animator,
    }
}

async fn within<F: std::future::Future>(f: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("timed out")
}

impl Harness {
    /// Consume notices until one matches, returning everything seen.
    async fn notices_until(&mut self, pred: impl Fn(&NoticeKind) -> bool) -> Vec<NoticeKind> {
        let mut seen = Vec::new();
        loop {
            let notice = within(self.notices.recv())
                .await
                .expect("notice stream ended");
            let done = pred(&notice.kind);
            seen.push(notice.kind);
            if done {
                return seen;
            }
        }
    }

    async fn listening(&self) {
        within(self.handle.wait_for(TurnState::ListeningForUser))
            .await
            .unwrap();
        within(async {
            while self.recognizer.active_session().is_none() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
    }

    fn speak(&self, text: &str) {
        self.input
            .send(RecognizerInput::Final(text.to_string()))
            .unwrap();
    }
}

fn bot_said(text: &'static str) -> impl Fn(&NoticeKind) -> bool {
    move |kind| matches!(kind, NoticeKind::BotSaid { text: t } if t == text)
}

#[tokio::test]
async fn greeting_then_one_exchange() {
    let mut h = harness("test-key", 1);
    h.handle.start().await.unwrap();

    h.notices_until(bot_said("Hello")).await;
    h.listening().await;

    h.input
        .send(RecognizerInput::Interim("h".to_string()))
        .unwrap();
    h.speak("hi");

    let seen = h.notices_until(bot_said("My User, you said: hi")).await;
    assert!(seen
        .iter()
        .any(|k| matches!(k, NoticeKind::UserSaid { text } if text == "hi")));
    h.listening().await;

    assert_eq!(
        *h.output.spoken.lock().unwrap(),
        vec!["Hello".to_string(), "My User, you said: hi".to_string()]
    );

    let calls = h.animator.calls();
    assert_eq!(calls.len(), 4);
    assert!(matches!(calls[0], AnimationCall::StartTalking(_)));
    assert_eq!(calls[1], AnimationCall::StopTalking);
    assert!(matches!(calls[2], AnimationCall::StartTalking(_)));
    assert_eq!(calls[3], AnimationCall::StopTalking);

    h.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn speech_while_avatar_talks_is_ignored() {
    // 5 chars at 40ms each keeps the greeting on air for 200ms
    let mut h = harness("test-key", 40);
    h.handle.start().await.unwrap();

    h.notices_until(bot_said("Hello")).await;
    h.speak("interrupting");

    let seen = h
        .notices_until(|k| {
            matches!(
                k,
                NoticeKind::StateChanged {
                    to: TurnState::ListeningForUser,
                    ..
                }
            )
        })
        .await;
    assert!(!seen
        .iter()
        .any(|k| matches!(k, NoticeKind::UserSaid { .. })));
    assert_eq!(h.handle.state(), TurnState::ListeningForUser);

    h.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_credentials_falls_back_to_idle() {
    let mut h = harness("", 1);
    h.handle.start().await.unwrap();

    let seen = h
        .notices_until(|k| matches!(k, NoticeKind::Error { .. }))
        .await;
    match seen.last() {
        Some(NoticeKind::Error { message }) => {
            assert!(message.contains("missing service credentials"))
        }
        other => panic!("Expected error notice, got {:?}", other),
    }
    within(h.handle.wait_for(TurnState::Idle)).await.unwrap();

    // A restart reuses the conversation and fails the same way
    h.handle.start().await.unwrap();
    h.notices_until(|k| matches!(k, NoticeKind::Error { .. }))
        .await;
    within(h.handle.wait_for(TurnState::Idle)).await.unwrap();

    h.handle.shutdown().await.unwrap();
}
