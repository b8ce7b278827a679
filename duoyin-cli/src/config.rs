//! Configuration management for the duoyin CLI
//!
//! Configuration priority (highest to lowest):
//! 1. Command line arguments
//! 2. Config file specified via --config flag
//! 3. Environment variables (DUOYIN_*)
//! 4. Local config file (./duoyin.toml)
//! 5. Global config file ($XDG_CONFIG_HOME/duoyin/config.toml or ~/.config/duoyin/config.toml)
//!
//! XDG environment variables are checked first on all platforms (including macOS).

use config::{Config, ConfigError, Environment, File};
use duoyin::pipeline::SchedulerOptions;
use duoyin::utils::dict_cache::{default_sources, DictSource};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Path of the generated JS module
    pub output: String,

    /// Directory for downloaded word lists and the progress snapshot
    pub cache_dir: String,

    /// Number of batches converted concurrently
    pub workers: usize,

    /// Phrases per batch
    pub batch_size: usize,

    /// Save progress every this many batches
    pub checkpoint_interval: usize,

    /// Give up on a batch after this many seconds (unbounded if unset)
    pub batch_timeout_secs: Option<u64>,

    /// Enable debug logging
    pub verbose: bool,

    /// Word lists to build from
    pub sources: Vec<DictSource>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output: "pinyin_data.js".to_string(),
            cache_dir: xdg_cache_home().join("duoyin").display().to_string(),
            workers: 8,
            batch_size: 1000,
            checkpoint_interval: 10,
            batch_timeout_secs: None,
            verbose: false,
            sources: default_sources(),
        }
    }
}

/// Get the XDG config directory ($XDG_CONFIG_HOME or ~/.config)
pub fn xdg_config_home() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".config"))
        .unwrap_or_else(|| PathBuf::from(".config"))
}

/// Get the XDG cache directory ($XDG_CACHE_HOME or ~/.cache)
pub fn xdg_cache_home() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".cache"))
        .unwrap_or_else(|| PathBuf::from(".cache"))
}

impl AppConfig {
    pub fn global_config_dir() -> PathBuf {
        xdg_config_home().join("duoyin")
    }

    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    pub fn local_config_path() -> PathBuf {
        PathBuf::from("duoyin.toml")
    }

    /// Load configuration with the priority chain described in the module docs
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = builder.add_source(config::File::from_str(
            include_str!("default_config.toml"),
            config::FileFormat::Toml,
        ));

        let global_path = Self::global_config_path();
        if global_path.exists() {
            builder = builder.add_source(File::from(global_path).required(false));
        }

        let local_path = Self::local_config_path();
        if local_path.exists() {
            builder = builder.add_source(File::from(local_path).required(false));
        }

        // e.g. DUOYIN_WORKERS=16, DUOYIN_CACHE_DIR=/tmp/duoyin
        builder = builder.add_source(
            Environment::with_prefix("DUOYIN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(config_path) = config_file {
            let expanded = expand_path(config_path);
            builder = builder.add_source(File::with_name(&expanded).required(true));
        }

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Write the default config to the global config directory if it is missing
    pub fn ensure_config_exists() -> std::io::Result<PathBuf> {
        let config_dir = Self::global_config_dir();
        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            std::fs::write(&config_path, include_str!("default_config.toml"))?;
        }
        Ok(config_path)
    }

    pub fn expanded_output(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.output))
    }

    pub fn expanded_cache_dir(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.cache_dir))
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            workers: self.workers,
            batch_size: self.batch_size,
            checkpoint_interval: self.checkpoint_interval,
            batch_timeout: self.batch_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn print_paths() {
        println!("Configuration paths:");
        println!("  Config dir:  {}", Self::global_config_dir().display());
        println!("  Config file: {}", Self::global_config_path().display());
        println!("  Local file:  {}", Self::local_config_path().display());
        println!("  Cache dir:   {}", xdg_cache_home().join("duoyin").display());
    }
}

/// Expand shell-like paths (~ and environment variables)
pub fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use duoyin::utils::dict_cache::DictFormat;
    use duoyin::Tokenize;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.output, "pinyin_data.js");
        assert_eq!(config.workers, 8);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                include_str!("default_config.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.checkpoint_interval, 10);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].tokenize, Tokenize::FirstToken);
        assert_eq!(config.sources[2].format, DictFormat::Zip);
        assert_eq!(config.sources, default_sources());
    }

    #[test]
    fn test_scheduler_options() {
        let config = AppConfig {
            batch_timeout_secs: Some(30),
            ..Default::default()
        };
        let options = config.scheduler_options();
        assert_eq!(options.batch_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.workers, 8);
    }

    #[test]
    fn test_expand_path() {
        let expanded = expand_path("~/test");
        assert!(!expanded.starts_with('~'));
    }
}
