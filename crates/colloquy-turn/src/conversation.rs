//! Conversation identity and read cursor.

use colloquy_core::error::TransportFault;
use colloquy_core::types::{ConversationId, Utterance, Watermark};

/// The single conversation this process takes part in.
///
/// The id is assigned once and never cleared. The watermark only moves
/// forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    conversation_id: Option<ConversationId>,
    watermark: Option<Watermark>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn watermark(&self) -> Option<Watermark> {
        self.watermark
    }

    /// Assign the conversation id. Returns `false` if one is already set.
    pub fn assign(&mut self, id: ConversationId) -> bool {
        if self.conversation_id.is_some() {
            return false;
        }
        self.conversation_id = Some(id);
        true
    }

    /// Whether `watermark` is past everything consumed so far.
    pub fn is_newer(&self, watermark: Watermark) -> bool {
        self.watermark.map_or(true, |current| watermark > current)
    }

    /// Move the cursor to `watermark` if it is newer. Returns whether it moved.
    pub fn advance(&mut self, watermark: Watermark) -> bool {
        if !self.is_newer(watermark) {
            return false;
        }
        self.watermark = Some(watermark);
        true
    }
}

/// Pick the utterance a poll result points at: the one whose sequence equals
/// the returned watermark.
///
/// An empty batch selects nothing. A non-empty batch that does not contain
/// the watermark's sequence is reported as out of range rather than indexed
/// blindly.
pub fn select_newest(
    utterances: &[Utterance],
    watermark: Watermark,
) -> Result<Option<&Utterance>, TransportFault> {
    let (Some(first), Some(last)) = (utterances.first(), utterances.last()) else {
        return Ok(None);
    };
    utterances
        .iter()
        .find(|u| u.sequence() == watermark.0)
        .map(Some)
        .ok_or(TransportFault::WatermarkOutOfRange {
            watermark: watermark.0,
            first: first.sequence(),
            last: last.sequence(),
        })
}
