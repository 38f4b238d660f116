use crate::credentials::SecretKey;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file, read only when present
const DEFAULT_CONFIG_FILE: &str = "bioportal.toml";

/// Complete service configuration.
///
/// The encryption key is never part of this struct; see [`load_secret_key`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Raises the default log level to debug
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            debug: false,
            static_dir: default_static_dir(),
        }
    }
}

/// Token database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tokens.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Upstream API configuration. No URL means mock mode.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Per-client request rate limiting
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_per_minute")]
    pub per_minute: u64,
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_per_minute() -> u64 {
    30
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            per_minute: default_per_minute(),
        }
    }
}

impl AppConfig {
    /// Loads the TOML file (if any) and applies environment overrides.
    ///
    /// The file is `$BIOPORTAL_CONFIG` when set, otherwise `bioportal.toml` if it exists.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("BIOPORTAL_CONFIG") {
            Ok(path) => load_config(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config(DEFAULT_CONFIG_FILE)?,
            Err(_) => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overlays environment variables on top of file/default values.
    ///
    /// `lookup` returns the value of a variable, or None when unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            self.server.port = v.trim().parse().context("PORT must be a valid port number")?;
        }
        if let Some(v) = lookup("DEBUG") {
            self.server.debug = parse_flag(&v);
        }
        if let Some(v) = lookup("STATIC_DIR") {
            self.server.static_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TOKENS_DB") {
            self.storage.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TARGET_API_URL") {
            let v = v.trim();
            self.upstream.url = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = lookup("RATE_LIMIT_ENABLED") {
            self.rate_limit.enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("RATE_LIMIT_PER_MINUTE") {
            self.rate_limit.per_minute = v
                .trim()
                .parse()
                .context("RATE_LIMIT_PER_MINUTE must be a positive integer")?;
        }

        Ok(())
    }

    /// True when no upstream is configured
    pub fn mock_mode(&self) -> bool {
        self.upstream.url.as_deref().map_or(true, |url| url.trim().is_empty())
    }
}

/// `1`, `true` and `yes` (any case) are true; anything else is false.
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Load configuration from TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Reads `ENCRYPTION_KEY` (64 hex chars) from the environment.
///
/// Called once at startup; an error here must stop the process before it serves traffic.
pub fn load_secret_key() -> Result<SecretKey> {
    load_secret_key_from(|name| std::env::var(name).ok())
}

/// Same as [`load_secret_key`], reading variables through `lookup`.
pub fn load_secret_key_from<F>(lookup: F) -> Result<SecretKey>
where
    F: Fn(&str) -> Option<String>,
{
    let key_hex = lookup("ENCRYPTION_KEY")
        .context("ENCRYPTION_KEY is required (generate one with: openssl rand -hex 32)")?;
    SecretKey::from_hex(&key_hex).context("Invalid ENCRYPTION_KEY")
}
