//! Builds a dictionary of Chinese polyphonic characters and the phrases that
//! use them, for downstream pronunciation and TTS front ends.
//!
//! Candidate phrases from several word lists are converted to pinyin by a
//! pool of workers, merged by a single owner, checkpointed periodically so an
//! interrupted build can resume, and finally pruned to genuinely polyphonic
//! entries and written out as a JS module.

pub mod dict;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod utils;

pub use dict::{PhoneticCapability, PinyinCapability, RawSource, Tokenize};
pub use error::{ConversionError, Error, Result};
pub use export::PolyphoneDictionary;
pub use pipeline::{BuildOutcome, CheckpointManager, Pipeline, RunOutcome, SchedulerOptions};
