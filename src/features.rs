//! Feature extraction: one fixed-size numeric vector per message.
//! Pure and total; missing optional fields already default to 0 on `RawMessage`.

use crate::ingest::types::RawMessage;

/// Number of feature columns.
pub const FEATURE_DIM: usize = 3;

/// `(word_count, reaction_total, thread_reply_count)` in that column order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub word_count: f64,
    pub reaction_total: f64,
    pub thread_reply_count: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; FEATURE_DIM] {
        [self.word_count, self.reaction_total, self.thread_reply_count]
    }
}

/// Whitespace-delimited token count; 0 for empty text.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn extract(msg: &RawMessage) -> FeatureVector {
    FeatureVector {
        word_count: word_count(&msg.text) as f64,
        reaction_total: f64::from(msg.reaction_total),
        thread_reply_count: f64::from(msg.thread_reply_count),
    }
}

/// Positionally aligned with `batch`.
pub fn extract_batch(batch: &[RawMessage]) -> Vec<FeatureVector> {
    batch.iter().map(extract).collect()
}
