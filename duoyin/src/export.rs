//! Final polyphone filtering and the generated JS module

use crate::error::{Error, Result};
use crate::pipeline::ProgressState;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// The two published maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolyphoneDictionary {
    /// Character -> its distinct syllables (always at least two)
    pub chars: BTreeMap<String, Vec<String>>,
    /// Phrase -> canonical pronunciation, only phrases with a polyphonic character
    pub phrases: BTreeMap<String, String>,
}

/// Keep characters with two or more distinct syllables, and the phrases using them
pub fn finalize(state: &ProgressState) -> PolyphoneDictionary {
    let chars: BTreeMap<String, Vec<String>> = state
        .char_pinyin_map
        .iter()
        .filter(|(_, pys)| pys.iter().collect::<BTreeSet<_>>().len() >= 2)
        .map(|(c, pys)| (c.clone(), pys.clone()))
        .collect();

    let phrases = state
        .poly_phrases
        .iter()
        .filter(|(phrase, _)| {
            phrase.chars().any(|c| {
                let mut buf = [0; 4];
                chars.contains_key(&*c.encode_utf8(&mut buf))
            })
        })
        .map(|(phrase, pinyin)| (phrase.clone(), pinyin.clone()))
        .collect();

    PolyphoneDictionary { chars, phrases }
}

/// Render the dictionary as an ES module
pub fn render_module(dictionary: &PolyphoneDictionary) -> Result<String> {
    let chars = serde_json::to_string_pretty(&dictionary.chars)?;
    let phrases = serde_json::to_string_pretty(&dictionary.phrases)?;

    let mut out = String::with_capacity(chars.len() + phrases.len() + 160);
    out.push_str("// Auto-generated polyphone data\n");
    out.push_str(&format!("const POLYPHONE_CHARS = {};\n", chars));
    out.push_str(&format!("const POLYPHONE_PHRASES = {};\n", phrases));
    out.push_str("export { POLYPHONE_CHARS, POLYPHONE_PHRASES };\n");
    Ok(out)
}

/// Write the module to `path`, replacing it atomically
pub fn write_module(dictionary: &PolyphoneDictionary, path: &Path) -> Result<()> {
    let module = render_module(dictionary)?;

    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let mut temp_file = NamedTempFile::new_in(parent_dir)?;
    temp_file.write_all(module.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
