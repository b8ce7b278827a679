//! Polyphone extraction for a single phrase
//!
//! Extraction is pure: it reads nothing but the phrase and the capability's
//! answer, and returns an owned [`PhraseReading`].

use super::phonetic::PhoneticCapability;
use crate::error::ConversionError;
use std::panic::{self, AssertUnwindSafe};

/// What one phrase contributes to the dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseReading {
    pub phrase: String,
    /// First valid syllable of each character, space separated
    pub pronunciation: String,
    /// Characters with more than one distinct valid syllable in this phrase
    pub polyphones: Vec<(char, Vec<String>)>,
}

/// A syllable is valid iff it is non-empty and every code point is alphanumeric
pub fn is_valid_syllable(syllable: &str) -> bool {
    !syllable.is_empty() && syllable.chars().all(is_alphanumeric_code_point)
}

/// Unicode Alphabetic or Numeric
fn is_alphanumeric_code_point(c: char) -> bool {
    c.is_alphabetic() || c.is_numeric()
}

/// Keep valid syllables only, or a single empty placeholder if none survive
pub fn filter_syllables(candidates: &[String]) -> Vec<String> {
    let filtered: Vec<String> = candidates
        .iter()
        .filter(|s| is_valid_syllable(s))
        .cloned()
        .collect();
    if filtered.is_empty() {
        vec![String::new()]
    } else {
        filtered
    }
}

/// Distinct values in first-seen order
fn distinct(syllables: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(syllables.len());
    for s in syllables {
        if !out.contains(s) {
            out.push(s.clone());
        }
    }
    out
}

/// Extract the reading of one phrase.
///
/// Returns `Ok(None)` when no character of the phrase has any valid syllable.
pub fn extract_phrase<C>(capability: &C, phrase: &str) -> Result<Option<PhraseReading>, ConversionError>
where
    C: PhoneticCapability + ?Sized,
{
    // A panicking capability only costs this phrase
    let raw = panic::catch_unwind(AssertUnwindSafe(|| capability.convert(phrase)))
        .map_err(|_| ConversionError::new(phrase, "phonetic capability panicked"))??;

    let chars: Vec<char> = phrase.chars().collect();
    if raw.len() != chars.len() {
        return Err(ConversionError::new(
            phrase,
            format!("expected {} readings, got {}", chars.len(), raw.len()),
        ));
    }

    let filtered: Vec<Vec<String>> = raw.iter().map(|c| filter_syllables(c)).collect();
    if filtered.iter().all(|pys| pys[0].is_empty()) {
        return Ok(None);
    }

    let pronunciation = filtered
        .iter()
        .map(|pys| pys[0].as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let polyphones = chars
        .iter()
        .zip(&filtered)
        .filter_map(|(&c, pys)| {
            let pys = distinct(pys);
            (pys.len() > 1).then_some((c, pys))
        })
        .collect();

    Ok(Some(PhraseReading {
        phrase: phrase.to_string(),
        pronunciation,
        polyphones,
    }))
}
