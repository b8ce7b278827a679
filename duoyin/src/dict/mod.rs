//! Dictionary side of the builder: source parsing, phonetic lookup and
//! per-phrase polyphone extraction.

pub mod extract;
pub mod phonetic;
pub mod source;

pub use extract::{extract_phrase, is_valid_syllable, PhraseReading};
pub use phonetic::{PhoneticCapability, PinyinCapability, Readings};
pub use source::{load_candidates, RawSource, SourceContent, Tokenize};
