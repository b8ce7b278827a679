//! Source loading: raw word lists to a deduplicated candidate phrase set

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeSet;

/// How a source's lines are turned into candidate phrases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tokenize {
    /// First whitespace-delimited token per line (word-frequency lists, e.g. `word freq tag`)
    FirstToken,
    /// The whole trimmed line (plain word lists)
    #[default]
    WholeLine,
}

/// Content of one source, decoded or not
#[derive(Debug, Clone)]
pub enum SourceContent {
    Text(String),
    /// Raw bytes, decoded as UTF-8 by the loader
    Bytes(Vec<u8>),
}

/// One dictionary source handed to the loader
#[derive(Debug, Clone)]
pub struct RawSource {
    pub id: String,
    pub tokenize: Tokenize,
    pub content: SourceContent,
}

impl RawSource {
    pub fn text(id: impl Into<String>, tokenize: Tokenize, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tokenize,
            content: SourceContent::Text(text.into()),
        }
    }

    pub fn bytes(id: impl Into<String>, tokenize: Tokenize, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            tokenize,
            content: SourceContent::Bytes(bytes),
        }
    }

    fn decoded(&self) -> Result<&str> {
        match &self.content {
            SourceContent::Text(text) => Ok(text),
            SourceContent::Bytes(bytes) => {
                std::str::from_utf8(bytes).map_err(|e| Error::SourceLoad {
                    source_id: self.id.clone(),
                    reason: format!("invalid UTF-8: {}", e),
                })
            }
        }
    }
}

/// Extract the candidate token of one line, if it is long enough to be a phrase
pub fn tokenize_line(line: &str, rule: Tokenize) -> Option<&str> {
    let token = match rule {
        Tokenize::FirstToken => line.split_whitespace().next()?,
        Tokenize::WholeLine => line.trim(),
    };
    // Single characters are not phrases
    (token.chars().count() > 1).then_some(token)
}

/// Parse one source into `phrases`, returning how many tokens it contributed
pub fn parse_source(source: &RawSource, phrases: &mut BTreeSet<String>) -> Result<usize> {
    let text = source.decoded()?;
    let mut contributed = 0;
    for line in text.lines() {
        if let Some(token) = tokenize_line(line, source.tokenize) {
            phrases.insert(token.to_string());
            contributed += 1;
        }
    }
    Ok(contributed)
}

/// Build the deduplicated candidate set from all sources.
///
/// A source that fails to parse is logged and skipped; the others still load.
pub fn load_candidates(sources: &[RawSource]) -> BTreeSet<String> {
    let mut phrases = BTreeSet::new();

    for source in sources {
        match parse_source(source, &mut phrases) {
            Ok(0) => tracing::debug!("Source '{}' contributed no phrases", source.id),
            Ok(n) => tracing::debug!("Source '{}' contributed {} phrases", source.id, n),
            Err(e) => tracing::warn!("Skipping source: {}", e),
        }
    }

    tracing::info!("Loaded {} candidate phrases", phrases.len());
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_token_rule() {
        assert_eq!(tokenize_line("重庆 34 ns", Tokenize::FirstToken), Some("重庆"));
        assert_eq!(tokenize_line("  学校\t12", Tokenize::FirstToken), Some("学校"));
        assert_eq!(tokenize_line("的 884778 uj", Tokenize::FirstToken), None);
        assert_eq!(tokenize_line("", Tokenize::FirstToken), None);
    }

    #[test]
    fn test_whole_line_rule() {
        assert_eq!(tokenize_line("  一心一意 \r", Tokenize::WholeLine), Some("一心一意"));
        assert_eq!(tokenize_line("好", Tokenize::WholeLine), None);
        // Inner whitespace is kept for whole-line sources
        assert_eq!(tokenize_line("长 城", Tokenize::WholeLine), Some("长 城"));
    }

    #[test]
    fn test_dedup_across_sources() {
        let sources = vec![
            RawSource::text("jieba", Tokenize::FirstToken, "重庆 10 ns\n学校 5 n\n"),
            RawSource::text("plain", Tokenize::WholeLine, "学校\n银行\n"),
        ];
        let phrases = load_candidates(&sources);
        let phrases: Vec<&str> = phrases.iter().map(String::as_str).collect();
        assert_eq!(phrases.len(), 3);
        assert!(phrases.contains(&"重庆"));
        assert!(phrases.contains(&"银行"));
    }

    #[test]
    fn test_bad_source_is_skipped() {
        let sources = vec![
            RawSource::bytes("broken", Tokenize::WholeLine, vec![0xff, 0xfe, 0x00]),
            RawSource::text("generic", Tokenize::WholeLine, "重庆\n"),
        ];
        let phrases = load_candidates(&sources);
        assert_eq!(phrases.len(), 1);
        assert!(phrases.contains("重庆"));
    }

    #[test]
    fn test_invalid_utf8_reports_source() {
        let source = RawSource::bytes("broken", Tokenize::WholeLine, vec![0xc3, 0x28]);
        let mut phrases = BTreeSet::new();
        match parse_source(&source, &mut phrases) {
            Err(Error::SourceLoad { source_id, .. }) => assert_eq!(source_id, "broken"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
