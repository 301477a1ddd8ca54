//! Recording mocks for the speech-side collaborators.
//!
//! They never publish anything on their own; tests feed the coordinator the
//! events a real implementation would produce and then inspect the calls.

use std::sync::{Arc, Mutex};

use colloquy_core::types::{ListenSession, PlaybackId};

use crate::avatar::{AnimationSink, TalkVariant};
use crate::{AudioPlaybackSink, SpeechRecognitionSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerCall {
    Start(ListenSession),
    Stop,
}

/// Mock recognizer tracking the live session and every call.
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    calls: Arc<Mutex<Vec<RecognizerCall>>>,
    active: Arc<Mutex<Option<ListenSession>>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecognizerCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("mock mutex poisoned").clear();
    }
}

impl SpeechRecognitionSource for MockRecognizer {
    fn start_continuous(&self, session: ListenSession) {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(RecognizerCall::Start(session));
        *self.active.lock().expect("mock mutex poisoned") = Some(session);
    }

    fn stop(&self) {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(RecognizerCall::Stop);
        self.active.lock().expect("mock mutex poisoned").take();
    }

    fn active_session(&self) -> Option<ListenSession> {
        *self.active.lock().expect("mock mutex poisoned")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackCall {
    Play(PlaybackId, String),
    Stop,
}

/// Mock playback sink recording play and stop requests.
#[derive(Debug, Clone, Default)]
pub struct MockPlayback {
    calls: Arc<Mutex<Vec<PlaybackCall>>>,
}

impl MockPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlaybackCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }

    /// Texts passed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlaybackCall::Play(_, text) => Some(text),
                PlaybackCall::Stop => None,
            })
            .collect()
    }

    /// Id of the most recent play request.
    pub fn last_playback(&self) -> Option<PlaybackId> {
        self.calls().into_iter().rev().find_map(|c| match c {
            PlaybackCall::Play(id, _) => Some(id),
            PlaybackCall::Stop => None,
        })
    }
}

impl AudioPlaybackSink for MockPlayback {
    fn play(&self, playback: PlaybackId, text: &str) {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(PlaybackCall::Play(playback, text.to_string()));
    }

    fn stop(&self) {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(PlaybackCall::Stop);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationCall {
    StartTalking(TalkVariant),
    StopTalking,
}

/// Animator recording the triggers it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnimator {
    calls: Arc<Mutex<Vec<AnimationCall>>>,
}

impl RecordingAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AnimationCall> {
        self.calls.lock().expect("mock mutex poisoned").clone()
    }
}

impl AnimationSink for RecordingAnimator {
    fn start_talking(&self, variant: TalkVariant) {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(AnimationCall::StartTalking(variant));
    }

    fn stop_talking(&self) {
        self.calls
            .lock()
            .expect("mock mutex poisoned")
            .push(AnimationCall::StopTalking);
    }
}
