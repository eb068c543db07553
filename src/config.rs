//! Configuration file parser for ~/.config/newscat/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged, since they are usually
//! typos. Precedence, lowest to highest: file, `NEWSCAT_*` environment
//! variables, command-line flags (applied by the binary).
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{
    read_sources, FetchSettings, OpmlError, DEFAULT_MAX_FEED_BYTES, DEFAULT_MAX_RETRIES,
};
use crate::util::validate_sources;

pub const ENV_DATABASE_PATH: &str = "NEWSCAT_DATABASE_PATH";
pub const ENV_MODEL_DIR: &str = "NEWSCAT_MODEL_DIR";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Failed to load OPML sources: {0}")]
    Opml(#[from] OpmlError),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Defaults to `entries.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub model_dir: Option<PathBuf>,

    /// Feed URLs to ingest.
    pub sources: Vec<String>,

    /// Optional OPML file whose outlines are added to `sources`.
    pub opml_path: Option<PathBuf>,

    /// Pause between consecutive entries of one source.
    pub entry_delay_ms: u64,

    pub fetch_timeout_secs: u64,

    /// Retries after a 429/5xx/truncated response.
    pub max_retries: u32,

    pub max_feed_bytes: usize,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            model_dir: None,
            sources: Vec::new(),
            opml_path: None,
            entry_delay_ms: 150,
            fetch_timeout_secs: 30,
            max_retries: DEFAULT_MAX_RETRIES,
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            user_agent: concat!("newscat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "database_path",
        "model_dir",
        "sources",
        "opml_path",
        "entry_delay_ms",
        "fetch_timeout_secs",
        "max_retries",
        "max_feed_bytes",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply `NEWSCAT_DATABASE_PATH` / `NEWSCAT_MODEL_DIR` from the process
    /// environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides through `lookup`. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var(ENV_DATABASE_PATH) {
            tracing::debug!(path = %path, "Database path overridden by environment");
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = var(ENV_MODEL_DIR) {
            tracing::debug!(dir = %dir, "Model directory overridden by environment");
            self.model_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn entry_delay(&self) -> Duration {
        Duration::from_millis(self.entry_delay_ms)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let timeout_secs = if self.fetch_timeout_secs == 0 {
            tracing::warn!("fetch_timeout_secs = 0 is not allowed, using 30");
            30
        } else {
            self.fetch_timeout_secs
        };

        FetchSettings {
            timeout: Duration::from_secs(timeout_secs),
            max_retries: self.max_retries,
            max_bytes: self.max_feed_bytes,
            user_agent: self.user_agent.clone(),
            ..FetchSettings::default()
        }
    }

    /// The sources a run should ingest, validated and deduplicated.
    ///
    /// `cli_sources`, when non-empty, replace the configured list and the
    /// OPML file entirely.
    pub fn resolve_sources(&self, cli_sources: &[String]) -> Result<Vec<String>, ConfigError> {
        if !cli_sources.is_empty() {
            return Ok(validate_sources(cli_sources));
        }

        let mut sources = self.sources.clone();
        if let Some(opml_path) = &self.opml_path {
            sources.extend(read_sources(opml_path)?);
        }
        Ok(validate_sources(sources))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database_path.is_none());
        assert!(config.model_dir.is_none());
        assert!(config.sources.is_empty());
        assert_eq!(config.entry_delay(), Duration::from_millis(150));
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_feed_bytes, 10 * 1024 * 1024);
        assert!(config.user_agent.starts_with("newscat/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.entry_delay_ms, 150);
    }

    #[test]
    fn test_empty_and_whitespace_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        for content in ["", "   \n  \n  "] {
            let config = Config::load(&write_config(&dir, content)).unwrap();
            assert_eq!(config.max_retries, 3);
        }
    }

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
database_path = "/var/lib/newscat/entries.db"
model_dir = "/opt/models/news-topic"
sources = ["https://a.example.com/rss", "https://b.example.com/atom"]
opml_path = "/etc/newscat/feeds.opml"
entry_delay_ms = 0
fetch_timeout_secs = 10
max_retries = 1
max_feed_bytes = 2048
user_agent = "test-agent"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/newscat/entries.db"))
        );
        assert_eq!(config.model_dir, Some(PathBuf::from("/opt/models/news-topic")));
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.opml_path, Some(PathBuf::from("/etc/newscat/feeds.opml")));
        assert_eq!(config.entry_delay(), Duration::ZERO);

        let fetch = config.fetch_settings();
        assert_eq!(fetch.timeout, Duration::from_secs(10));
        assert_eq!(fetch.max_retries, 1);
        assert_eq!(fetch.max_bytes, 2048);
        assert_eq!(fetch.user_agent, "test-agent");
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(&dir, "max_retries = 5\n")).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.entry_delay_ms, 150);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&write_config(&dir, "this is not [valid toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(&dir, "sources = \"not-a-list\"\n"));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(
            &dir,
            "max_retries = 2\ntotally_fake_key = \"x\"\n",
        ))
        .unwrap();
        assert_eq!(config.max_retries, 2);
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&write_config(&dir, &"a".repeat(1_048_577))).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load(&write_config(
            &dir,
            "database_path = \"/from/file.db\"\nmodel_dir = \"/from/file\"\n",
        ))
        .unwrap();

        let env: HashMap<&str, &str> = [(ENV_DATABASE_PATH, "/from/env.db"), (ENV_MODEL_DIR, "  ")]
            .into_iter()
            .collect();
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path, Some(PathBuf::from("/from/env.db")));
        // Blank values do not override
        assert_eq!(config.model_dir, Some(PathBuf::from("/from/file")));
    }

    #[test]
    fn test_zero_timeout_falls_back() {
        let config = Config {
            fetch_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.fetch_settings().timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_sources_merges_opml_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let opml = dir.path().join("feeds.opml");
        std::fs::write(
            &opml,
            r#"<opml version="2.0"><body>
  <outline xmlUrl="https://b.example.com/rss"/>
  <outline xmlUrl="https://a.example.com/rss"/>
</body></opml>"#,
        )
        .unwrap();

        let config = Config {
            sources: vec![
                "https://a.example.com/rss".to_string(),
                "http://127.0.0.1/feed".to_string(),
                "not a url".to_string(),
            ],
            opml_path: Some(opml),
            ..Config::default()
        };

        assert_eq!(
            config.resolve_sources(&[]).unwrap(),
            vec!["https://a.example.com/rss", "https://b.example.com/rss"]
        );
    }

    #[test]
    fn test_cli_sources_replace_configured() {
        let config = Config {
            sources: vec!["https://a.example.com/rss".to_string()],
            opml_path: Some(PathBuf::from("/does/not/exist.opml")),
            ..Config::default()
        };

        let cli = vec!["https://cli.example.com/feed".to_string()];
        assert_eq!(
            config.resolve_sources(&cli).unwrap(),
            vec!["https://cli.example.com/feed"]
        );
    }

    #[test]
    fn test_missing_opml_is_error() {
        let config = Config {
            opml_path: Some(PathBuf::from("/does/not/exist.opml")),
            ..Config::default()
        };
        assert!(matches!(
            config.resolve_sources(&[]),
            Err(ConfigError::Opml(OpmlError::Io(_)))
        ));
    }
}
