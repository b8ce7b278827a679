//! Phonetic capability: phrase to per-character candidate syllables
//!
//! The pipeline only depends on the [`PhoneticCapability`] trait. The default
//! implementation reads the heteronym tables of the `pinyin` crate.

use crate::error::ConversionError;
use pinyin::ToPinyinMulti;

/// Candidate syllables for each character of a phrase, in character order
pub type Readings = Vec<Vec<String>>;

/// Converts a phrase into heteronym-aware candidate syllables.
///
/// The returned list must have one entry per character of `phrase`. An entry
/// may be empty when the character has no known reading.
pub trait PhoneticCapability: Send + Sync {
    fn convert(&self, phrase: &str) -> Result<Readings, ConversionError>;
}

/// Plain-style pinyin (no tone marks) with every known reading per character
#[derive(Debug, Clone, Copy, Default)]
pub struct PinyinCapability;

impl PinyinCapability {
    pub fn new() -> Self {
        Self
    }

    /// All plain readings of one character, deduplicated, table order kept
    fn char_readings(c: char) -> Vec<String> {
        let mut readings: Vec<String> = Vec::new();
        if let Some(multi) = c.to_pinyin_multi() {
            for py in multi {
                // Tone variants collapse to the same plain syllable
                let plain = py.plain();
                if !readings.iter().any(|r| r == plain) {
                    readings.push(plain.to_string());
                }
            }
        }
        readings
    }
}

impl PhoneticCapability for PinyinCapability {
    fn convert(&self, phrase: &str) -> Result<Readings, ConversionError> {
        if phrase.is_empty() {
            return Err(ConversionError::new(phrase, "empty phrase"));
        }
        Ok(phrase.chars().map(Self::char_readings).collect())
    }
}
