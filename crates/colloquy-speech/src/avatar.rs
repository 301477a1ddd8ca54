//! Avatar talking animation triggers.
//!
//! Purely cosmetic: the coordinator fires `start_talking` when it enters
//! Speaking and `stop_talking` when it leaves.

use std::fmt;

use rand::Rng;

/// The two interchangeable talking animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TalkVariant {
    A,
    B,
}

impl TalkVariant {
    pub const ALL: [TalkVariant; 2] = [TalkVariant::A, TalkVariant::B];

    /// Pick one variant uniformly at random.
    pub fn random() -> Self {
        let idx = rand::rng().random_range(0..Self::ALL.len());
        Self::ALL[idx]
    }

    /// Animator trigger name for this variant.
    pub fn trigger(&self) -> &'static str {
        match self {
            TalkVariant::A => "startTalking_a",
            TalkVariant::B => "startTalking_b",
        }
    }
}

impl fmt::Display for TalkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trigger())
    }
}

/// Trigger name fired when the avatar stops talking.
pub const STOP_TALKING_TRIGGER: &str = "stopTalking";

/// Receiver of talking animation triggers.
pub trait AnimationSink: Send + Sync {
    fn start_talking(&self, variant: TalkVariant);
    fn stop_talking(&self);
}

/// Animator that only logs the triggers it receives.
#[derive(Debug, Clone, Default)]
pub struct LoggingAnimator;

impl AnimationSink for LoggingAnimator {
    fn start_talking(&self, variant: TalkVariant) {
        tracing::info!(trigger = variant.trigger(), "Avatar starts talking");
    }

    fn stop_talking(&self) {
        tracing::info!(trigger = STOP_TALKING_TRIGGER, "Avatar stops talking");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_names() {
        assert_eq!(TalkVariant::A.trigger(), "startTalking_a");
        assert_eq!(TalkVariant::B.trigger(), "startTalking_b");
        assert_eq!(TalkVariant::B.to_string(), "startTalking_b");
        assert_eq!(STOP_TALKING_TRIGGER, "stopTalking");
    }

    #[test]
    fn test_random_covers_both_variants() {
        let mut seen_a = false;
        let mut seen_b = false;
        for _ in 0..500 {
            match TalkVariant::random() {
                TalkVariant::A => seen_a = true,
                TalkVariant::B => seen_b = true,
            }
        }
        assert!(seen_a && seen_b);
    }
}
