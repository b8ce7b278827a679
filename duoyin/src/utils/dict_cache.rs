//! Download, cache and unpack the raw word lists

use crate::dict::{RawSource, Tokenize};
use crate::error::{Error, Result};
use dirs::cache_dir;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// On-disk format of a dictionary download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictFormat {
    /// A single UTF-8 text file
    #[default]
    Text,
    /// A zip archive; every member is a UTF-8 text file
    Zip,
}

/// A word list to fetch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DictSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub format: DictFormat,
    #[serde(default)]
    pub tokenize: Tokenize,
}

impl DictSource {
    /// Cache file name: the last path segment of the URL
    pub fn file_name(&self) -> &str {
        self.url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

/// The word lists the dictionary is normally built from
pub fn default_sources() -> Vec<DictSource> {
    vec![
        DictSource {
            name: "jieba_big_dict".into(),
            url: "https://github.com/fxsjy/jieba/raw/master/extra_dict/dict.txt.big".into(),
            format: DictFormat::Text,
            tokenize: Tokenize::FirstToken,
        },
        DictSource {
            name: "modern_chinese".into(),
            url: "https://raw.githubusercontent.com/cmusphinx/cmudict/master/scripts/mandarin_words.txt"
                .into(),
            format: DictFormat::Text,
            tokenize: Tokenize::WholeLine,
        },
        DictSource {
            name: "wikipedia_phrases".into(),
            url: "https://github.com/brightmart/nlp_chinese_corpus/raw/master/dictionary/word/phrase.txt.zip"
                .into(),
            format: DictFormat::Zip,
            tokenize: Tokenize::WholeLine,
        },
    ]
}

/// Default cache directory for downloaded word lists
pub fn get_dict_cache_dir() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("duoyin")
}

/// Download `source` into `cache_dir` unless it is already there
pub async fn download_source(source: &DictSource, cache_dir: &Path) -> Result<PathBuf> {
    let path = cache_dir.join(source.file_name());
    if path.exists() {
        tracing::debug!("Using cached dictionary: {}", path.display());
        return Ok(path);
    }
    fs::create_dir_all(cache_dir)?;

    tracing::info!("Downloading dictionary: {}", source.url);
    match fetch_to(&source.url, &path).await {
        Ok(()) => Ok(path),
        Err(e) => {
            // Never leave a truncated file behind; it would be taken as cached next time
            let _ = fs::remove_file(&path);
            Err(e)
        }
    }
}

async fn fetch_to(url: &str, path: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;
    let mut response = client
        .get(url)
        .header("User-Agent", "duoyin")
        .send()
        .await?
        .error_for_status()?;

    let pb = match response.content_length() {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style);
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };
    pb.set_message(url.rsplit('/').next().unwrap_or(url).to_string());

    let mut file = File::create(path)?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)?;
        pb.inc(chunk.len() as u64);
    }
    file.flush()?;
    pb.finish_and_clear();
    Ok(())
}

/// Read a cached download into loader input. A zip yields one source per member.
pub fn read_source(source: &DictSource, path: &Path) -> Result<Vec<RawSource>> {
    match source.format {
        DictFormat::Text => {
            let bytes = fs::read(path)?;
            Ok(vec![RawSource::bytes(&source.name, source.tokenize, bytes)])
        }
        DictFormat::Zip => {
            let mut archive = zip::ZipArchive::new(File::open(path)?)?;
            let mut members = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let mut entry = archive.by_index(i)?;
                if entry.is_dir() {
                    continue;
                }
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                let id = format!("{}/{}", source.name, entry.name());
                members.push(RawSource::bytes(id, source.tokenize, bytes));
            }
            Ok(members)
        }
    }
}

/// Fetch every source. Sources that fail to download or unpack are logged
/// and left out.
pub async fn fetch_sources(sources: &[DictSource], cache_dir: &Path) -> Vec<RawSource> {
    let mut raw = Vec::new();
    for source in sources {
        let loaded = match download_source(source, cache_dir).await {
            Ok(path) => read_source(source, &path),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(mut members) => raw.append(&mut members),
            Err(e) => {
                let e = Error::SourceLoad {
                    source_id: source.name.clone(),
                    reason: e.to_string(),
                };
                tracing::warn!("Skipping source: {}", e);
            }
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::SourceContent;
    use zip::write::SimpleFileOptions;

    fn source(format: DictFormat) -> DictSource {
        DictSource {
            name: "test".into(),
            url: "https://example.invalid/words/phrase.txt.zip".into(),
            format,
            tokenize: Tokenize::WholeLine,
        }
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(source(DictFormat::Zip).file_name(), "phrase.txt.zip");
        let mut bare = source(DictFormat::Text);
        bare.url = "https://example.invalid/".into();
        assert_eq!(bare.file_name(), "test");
    }

    #[test]
    fn test_default_sources() {
        let sources = default_sources();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].tokenize, Tokenize::FirstToken);
        assert_eq!(sources[2].format, DictFormat::Zip);
    }

    #[test]
    fn test_read_zip_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrase.txt.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
            zip.start_file("a.txt", SimpleFileOptions::default()).unwrap();
            zip.write_all("重庆\n".as_bytes()).unwrap();
            zip.start_file("b.txt", SimpleFileOptions::default()).unwrap();
            zip.write_all("学校\n".as_bytes()).unwrap();
            zip.finish().unwrap();
        }

        let members = read_source(&source(DictFormat::Zip), &path).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, "test/a.txt");
        match &members[1].content {
            SourceContent::Bytes(bytes) => assert_eq!(bytes, "学校\n".as_bytes()),
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_read_broken_zip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        fs::write(&path, b"not a zip").unwrap();
        assert!(read_source(&source(DictFormat::Zip), &path).is_err());
    }

    #[tokio::test]
    async fn test_cached_file_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(DictFormat::Text);
        fs::write(dir.path().join(src.file_name()), "重庆\n").unwrap();
        let path = download_source(&src, dir.path()).await.unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "重庆\n");
    }
}
