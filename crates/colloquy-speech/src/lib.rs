//! Colloquy Speech crate - recognition input, synthesized playback and avatar triggers.
//!
//! Provides trait-based abstractions for the three speech-side collaborators
//! of the turn coordinator, channel-driven implementations that report back
//! through the shared event bus, and recording mocks for tests.

pub mod avatar;
pub mod mock;
pub mod pcm;
pub mod playback;
pub mod recognizer;

use colloquy_core::types::{ListenSession, PlaybackId};

pub use avatar::{AnimationSink, LoggingAnimator, TalkVariant};
pub use mock::{AnimationCall, MockPlayback, MockRecognizer, PlaybackCall, RecognizerCall, RecordingAnimator};
pub use playback::{
    AudioOutput, ConsoleOutput, SilentSynthesizer, SpeechSynthesizer, SynthesizedAudio,
    SynthesizingPlayback,
};
pub use recognizer::{ChannelRecognizer, RecognizerInput};

// =============================================================================
// Traits
// =============================================================================

/// Continuous speech recognition feeding finalized transcripts to the bus.
///
/// Implementations publish `ConversationEvent::Recognized` tagged with the
/// session passed to `start_continuous`, and `RecognitionError` on engine
/// cancellation. Interim hypotheses never surface.
pub trait SpeechRecognitionSource: Send + Sync {
    /// Begin (or keep) listening under `session`.
    ///
    /// Starting while already listening is not an error: the same session is
    /// a no-op, a different session replaces the old one.
    fn start_continuous(&self, session: ListenSession);

    /// Stop listening. Idempotent. Once this returns no further recognition
    /// event is published until the next `start_continuous`.
    fn stop(&self);

    /// The live session, if listening.
    fn active_session(&self) -> Option<ListenSession>;
}

/// Text-to-speech playback.
///
/// `play` returns immediately; the sink publishes exactly one
/// `PlaybackFinished` or `SynthesisFailed` for the given id unless it is
/// stopped first.
pub trait AudioPlaybackSink: Send + Sync {
    fn play(&self, playback: PlaybackId, text: &str);

    /// Abandon any in-flight playback without reporting it.
    fn stop(&self);
}
