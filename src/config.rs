use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// HTTP / WebSocket listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Allow any origin (the browser extension calls in cross-origin)
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_permissive: true,
        }
    }
}

/// Search shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-category cap when an HTTP request gives no `limit`
    pub default_limit: usize,
    /// Largest per-category cap a request may ask for
    pub max_limit: usize,
    /// Minimum number of raw items requested from the catalog per search
    pub overfetch_limit: usize,
    /// Per-category cap used for WebSocket SEARCH messages
    pub ws_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 50,
            overfetch_limit: 50,
            ws_limit: 20,
        }
    }
}

/// Cache lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub search_ttl_secs: u64,
    pub playlist_ttl_secs: u64,
    /// How often expired entries are swept out (0 disables the sweep)
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: 3600,
            playlist_ttl_secs: 300,
            purge_interval_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn playlist_ttl(&self) -> Duration {
        Duration::from_secs(self.playlist_ttl_secs)
    }
}

/// Catalog backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to yt-dlp (None = look it up in PATH)
    pub ytdlp_path: Option<String>,
    /// Upper bound for a single catalog call
    pub timeout_secs: u64,
    /// Run a probe search before accepting connections
    pub verify_on_startup: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            timeout_secs: 30,
            verify_on_startup: true,
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log output settings; `RUST_LOG` takes precedence over `filter`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "beat_relay=info,tower_http=info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("beat-relay");

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the services cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.search.max_limit == 0 {
            anyhow::bail!("search.max_limit must be at least 1");
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            anyhow::bail!(
                "search.default_limit must be between 1 and search.max_limit ({})",
                self.search.max_limit
            );
        }
        if self.search.ws_limit == 0 || self.search.ws_limit > self.search.max_limit {
            anyhow::bail!(
                "search.ws_limit must be between 1 and search.max_limit ({})",
                self.search.max_limit
            );
        }
        if self.catalog.timeout_secs == 0 {
            anyhow::bail!("catalog.timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Generate example config content for documentation
    pub fn example_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
