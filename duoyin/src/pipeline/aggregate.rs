//! Single-writer aggregation of batch results into the global dictionary state

use crate::dict::PhraseReading;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything needed to resume a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    /// End of the longest fully merged prefix of the candidate sequence
    pub current_index: usize,
    pub processed_phrases: BTreeSet<String>,
    /// Character -> distinct syllables in first-seen order
    pub char_pinyin_map: BTreeMap<String, Vec<String>>,
    /// Phrase -> canonical pronunciation
    pub poly_phrases: BTreeMap<String, String>,
}

/// Output of one worker for one batch
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Position of the batch in the candidate sequence
    pub start: usize,
    pub end: usize,
    pub readings: Vec<PhraseReading>,
}

/// Owns the mutable dictionary state. Workers never see it; they hand back
/// [`BatchResult`]s that are merged here one at a time.
#[derive(Debug)]
pub struct Aggregator {
    state: ProgressState,
    /// Batches merged ahead of `current_index`, keyed by start
    ahead: BTreeMap<usize, usize>,
    batches_merged: usize,
}

impl Aggregator {
    pub fn new(state: ProgressState) -> Self {
        Self {
            state,
            ahead: BTreeMap::new(),
            batches_merged: 0,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn into_state(self) -> ProgressState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn batches_merged(&self) -> usize {
        self.batches_merged
    }

    pub fn is_processed(&self, phrase: &str) -> bool {
        self.state.processed_phrases.contains(phrase)
    }

    /// Phrases of `batch` that have not been merged yet
    pub fn pending(&self, batch: &[String]) -> Vec<String> {
        batch
            .iter()
            .filter(|p| !self.is_processed(p))
            .cloned()
            .collect()
    }

    /// Merge the readings of one batch, returning how many phrases were new.
    ///
    /// Merging is order independent and idempotent: a phrase already in the
    /// processed set is ignored.
    pub fn merge(&mut self, readings: &[PhraseReading]) -> usize {
        let mut merged = 0;
        for reading in readings {
            if !self.state.processed_phrases.insert(reading.phrase.clone()) {
                continue;
            }
            for (c, syllables) in &reading.polyphones {
                let known = self.state.char_pinyin_map.entry(c.to_string()).or_default();
                for syllable in syllables {
                    if !known.contains(syllable) {
                        known.push(syllable.clone());
                    }
                }
            }
            self.state
                .poly_phrases
                .insert(reading.phrase.clone(), reading.pronunciation.clone());
            merged += 1;
        }
        merged
    }

    /// Merge a whole batch and advance the progress index
    pub fn merge_batch(&mut self, result: &BatchResult) -> usize {
        let merged = self.merge(&result.readings);
        self.complete_range(result.start, result.end);
        self.batches_merged += 1;
        merged
    }

    /// Record `[start, end)` as done; the index only moves over a gapless prefix
    pub fn complete_range(&mut self, start: usize, end: usize) {
        if end <= self.state.current_index {
            return;
        }
        self.ahead.insert(start, end);
        while let Some(end) = self.ahead.remove(&self.state.current_index) {
            self.state.current_index = end;
        }
    }

    /// Log a human readable progress line
    pub fn report_progress(&self, total: usize) {
        let index = self.state.current_index.min(total);
        let pct = if total == 0 {
            100.0
        } else {
            index as f64 * 100.0 / total as f64
        };
        tracing::info!(
            "Progress: {}/{} ({:.1}%), {} phrases processed, {} polyphonic characters so far",
            index,
            total,
            pct,
            self.state.processed_phrases.len(),
            self.state.char_pinyin_map.len()
        );
    }
}
