//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EZARC_CONFIG` (environment variable)
//! 2. `~/.config/ezarc/config.toml` (Linux/macOS)
//!    `%APPDATA%\ezarc\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Archive decoding settings.
    pub archive: ArchiveConfig,
    /// Attachment cache settings.
    pub cache: CacheConfig,
    /// Full-text search settings.
    pub search: SearchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding one ezmlm list directory per list.
    pub lists_root: PathBuf,
    /// Default number of messages returned by "latest messages" queries.
    pub default_limit: usize,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Archive decoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Abstract budget in Unicode code points (not bytes).
    pub abstract_size: usize,
    /// Maximum messages a single full-contents query may materialize.
    pub contents_cap: usize,
    /// Encoding label tried when index bytes are not valid UTF-8.
    pub fallback_charset: String,
    /// Locale code for month abbreviations in index date lines.
    pub locale: String,
}

/// Attachment cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory for extracted attachments.
    /// Defaults to `<user cache dir>/ezarc/attachments`.
    pub attachments_dir: Option<PathBuf>,
}

/// Full-text search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidate engine: "grep" (external binary) or "scan" (in-process).
    pub engine: String,
    /// Path to the grep binary used for candidate matching.
    pub grep_path: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            lists_root: PathBuf::from("/var/lib/ezmlm"),
            default_limit: 10,
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            abstract_size: 300,
            contents_cap: 200,
            fallback_charset: "windows-1252".to_string(),
            locale: "en".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            attachments_dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: "grep".to_string(),
            grep_path: "grep".to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit path, failing loudly on bad TOML.
pub fn load_config_from(path: &std::path::Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<Config>(&contents)?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("EZARC_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("ezarc").join("config.toml"))
}

/// Return the cache directory for logs and extracted attachments.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ezarc")
}

/// Root directory for the attachment cache.
pub fn attachments_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.cache.attachments_dir {
        return dir.clone();
    }
    cache_dir(config).join("attachments")
}
