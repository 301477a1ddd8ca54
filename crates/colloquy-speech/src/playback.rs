//! Synthesize-then-play sink.
//!
//! `play` hands the text to a [`SpeechSynthesizer`] on the blocking pool,
//! converts the returned PCM to samples, renders it through an
//! [`AudioOutput`], waits for the clip length and then reports
//! `PlaybackFinished`. A failing synthesizer reports `SynthesisFailed`
//! instead, so the conversation is never left waiting on a clip that will
//! not play.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use colloquy_core::config::SynthesisConfig;
use colloquy_core::error::{ColloquyError, Result};
use colloquy_core::types::PlaybackId;
use colloquy_core::{ConversationEvent, EventBus};

use crate::pcm::{clip_duration, pcm16le_to_f32};
use crate::AudioPlaybackSink;

/// Mono 16-bit little-endian PCM produced by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

/// Text-to-speech engine. Called on the blocking pool.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

/// Where rendered samples go (speaker device, console, nowhere).
pub trait AudioOutput: Send + Sync {
    fn render(&self, text: &str, samples: &[f32], sample_rate: u32) -> Result<()>;
}

/// Synthesizer producing silence whose length follows the text, at a fixed
/// speaking pace. Stands in for a cloud voice when none is configured.
#[derive(Debug, Clone)]
pub struct SilentSynthesizer {
    sample_rate: u32,
    ms_per_char: u32,
}

impl SilentSynthesizer {
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            ms_per_char: config.ms_per_char,
        }
    }
}

impl SpeechSynthesizer for SilentSynthesizer {
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let chars = text.trim().chars().count();
        if chars == 0 {
            return Err(ColloquyError::Synthesis("nothing to synthesize".to_string()));
        }
        let millis = chars as u64 * self.ms_per_char as u64;
        let samples = millis * self.sample_rate as u64 / 1000;
        Ok(SynthesizedAudio {
            pcm: vec![0u8; samples as usize * 2],
            sample_rate: self.sample_rate,
        })
    }
}

/// Output that prints the spoken text to stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleOutput;

impl AudioOutput for ConsoleOutput {
    fn render(&self, text: &str, samples: &[f32], sample_rate: u32) -> Result<()> {
        println!("bot> {}", text);
        tracing::debug!(
            samples = samples.len(),
            sample_rate,
            "Rendered synthesized clip"
        );
        Ok(())
    }
}

struct InFlight {
    playback: PlaybackId,
    task: JoinHandle<()>,
}

/// [`AudioPlaybackSink`] built from a synthesizer and an output.
pub struct SynthesizingPlayback {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    bus: EventBus<ConversationEvent>,
    current: Arc<Mutex<Option<PlaybackId>>>,
    in_flight: Mutex<Option<InFlight>>,
}

impl std::fmt::Debug for SynthesizingPlayback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizingPlayback")
            .field("current", &*self.current.lock().expect("playback mutex poisoned"))
            .finish()
    }
}

impl SynthesizingPlayback {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        bus: EventBus<ConversationEvent>,
    ) -> Self {
        Self {
            synthesizer,
            output,
            bus,
            current: Arc::new(Mutex::new(None)),
            in_flight: Mutex::new(None),
        }
    }
}

/// Publish `event` only if `playback` is still the current request.
fn report(
    current: &Mutex<Option<PlaybackId>>,
    bus: &EventBus<ConversationEvent>,
    playback: PlaybackId,
    event: ConversationEvent,
) {
    let mut guard = current.lock().expect("playback mutex poisoned");
    if *guard == Some(playback) {
        *guard = None;
        bus.publish(event);
    } else {
        tracing::debug!(%playback, "Playback superseded, completion dropped");
    }
}

async fn run_playback(
    playback: PlaybackId,
    text: String,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    bus: EventBus<ConversationEvent>,
    current: Arc<Mutex<Option<PlaybackId>>>,
) {
    let spoken = text.clone();
    let synthesized = tokio::task::spawn_blocking(move || synthesizer.synthesize(&spoken))
        .await
        .map_err(|e| ColloquyError::Synthesis(format!("synthesis task failed: {}", e)))
        .and_then(|r| r);

    let audio = match synthesized {
        Ok(audio) => audio,
        Err(e) => {
            tracing::warn!(%playback, error = %e, "Speech synthesis failed");
            report(
                &current,
                &bus,
                playback,
                ConversationEvent::SynthesisFailed {
                    playback,
                    reason: e.to_string(),
                },
            );
            return;
        }
    };

    let samples = pcm16le_to_f32(&audio.pcm);
    let duration = clip_duration(samples.len(), audio.sample_rate);
    if let Err(e) = output.render(&text, &samples, audio.sample_rate) {
        tracing::warn!(%playback, error = %e, "Audio output failed");
        report(
            &current,
            &bus,
            playback,
            ConversationEvent::SynthesisFailed {
                playback,
                reason: e.to_string(),
            },
        );
        return;
    }

    tracing::info!(%playback, duration_ms = duration.as_millis() as u64, "Speech synthesis succeeded");
    tokio::time::sleep(duration).await;
    report(
        &current,
        &bus,
        playback,
        ConversationEvent::PlaybackFinished { playback },
    );
}

impl AudioPlaybackSink for SynthesizingPlayback {
    fn play(&self, playback: PlaybackId, text: &str) {
        self.stop();

        *self.current.lock().expect("playback mutex poisoned") = Some(playback);
        let task = tokio::spawn(run_playback(
            playback,
            text.to_string(),
            Arc::clone(&self.synthesizer),
            Arc::clone(&self.output),
            self.bus.clone(),
            Arc::clone(&self.current),
        ));

        *self.in_flight.lock().expect("playback mutex poisoned") = Some(InFlight { playback, task });
    }

    fn stop(&self) {
        self.current.lock().expect("playback mutex poisoned").take();
        if let Some(previous) = self.in_flight.lock().expect("playback mutex poisoned").take() {
            if !previous.task.is_finished() {
                tracing::debug!(playback = %previous.playback, "Playback stopped");
            }
            previous.task.abort();
        }
    }
}

impl Drop for SynthesizingPlayback {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.in_flight.lock() {
            if let Some(previous) = guard.take() {
                previous.task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FailingSynthesizer;

    impl SpeechSynthesizer for FailingSynthesizer {
        fn synthesize(&self, _text: &str) -> Result<SynthesizedAudio> {
            Err(ColloquyError::Synthesis("quota exceeded".to_string()))
        }
    }

    #[derive(Default)]
    struct CapturingOutput {
        rendered: Mutex<Vec<(String, usize)>>,
    }

    impl AudioOutput for CapturingOutput {
        fn render(&self, text: &str, samples: &[f32], _sample_rate: u32) -> Result<()> {
            self.rendered
                .lock()
                .unwrap()
                .push((text.to_string(), samples.len()));
            Ok(())
        }
    }

    fn fast_synth() -> Arc<SilentSynthesizer> {
        Arc::new(SilentSynthesizer::new(&SynthesisConfig {
            sample_rate: 16_000,
            ms_per_char: 1,
        }))
    }

    #[test]
    fn test_silent_synthesizer_length_follows_text() {
        let synth = SilentSynthesizer::new(&SynthesisConfig {
            sample_rate: 16_000,
            ms_per_char: 50,
        });
        let audio = synth.synthesize("hello").unwrap();
        // 5 chars * 50ms = 250ms = 4000 samples = 8000 bytes
        assert_eq!(audio.pcm.len(), 8_000);
        assert_eq!(audio.sample_rate, 16_000);
        assert!(synth.synthesize("   ").is_err());
    }

    #[tokio::test]
    async fn test_play_reports_finished_once() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let output = Arc::new(CapturingOutput::default());
        let sink = SynthesizingPlayback::new(fast_synth(), output.clone(), bus.clone());

        sink.play(PlaybackId(1), "Hello");
        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            event,
            ConversationEvent::PlaybackFinished {
                playback: PlaybackId(1)
            }
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sub.drain().is_empty());

        let rendered = output.rendered.lock().unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].0, "Hello");
        assert_eq!(rendered[0].1, 80);
    }

    #[tokio::test]
    async fn test_failed_synthesis_reports_failure() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let sink = SynthesizingPlayback::new(
            Arc::new(FailingSynthesizer),
            Arc::new(CapturingOutput::default()),
            bus.clone(),
        );

        sink.play(PlaybackId(9), "anything");
        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();

        match event {
            ConversationEvent::SynthesisFailed { playback, reason } => {
                assert_eq!(playback, PlaybackId(9));
                assert!(reason.contains("quota exceeded"));
            }
            other => panic!("Expected SynthesisFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_suppresses_completion() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let slow = Arc::new(SilentSynthesizer::new(&SynthesisConfig {
            sample_rate: 16_000,
            ms_per_char: 100,
        }));
        let sink = SynthesizingPlayback::new(slow, Arc::new(CapturingOutput::default()), bus.clone());

        sink.play(PlaybackId(1), "a long reply");
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.stop();
        sink.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(sub.drain().is_empty());
    }

    #[tokio::test]
    async fn test_new_play_supersedes_old() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let sink = SynthesizingPlayback::new(fast_synth(), Arc::new(CapturingOutput::default()), bus.clone());

        sink.play(PlaybackId(1), "first");
        sink.play(PlaybackId(2), "second");
        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ConversationEvent::PlaybackFinished {
                playback: PlaybackId(2)
            }
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sub.drain().is_empty());
    }
}
