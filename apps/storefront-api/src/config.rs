//! # API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_PORT=8080                                               │
//! │     STOREFRONT_DATABASE_PATH=/var/lib/storefront/shop.db               │
//! │     STOREFRONT_HOSTED_SECRET_KEY=...                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $STOREFRONT_CONFIG, else ./storefront.toml                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! cors_origins = ["https://shop.example"]
//!
//! [database]
//! path = "storefront.db"
//! sweep_interval_secs = 300
//!
//! [checkout]
//! currency = "EUR"
//! amount_tolerance_cents = 1
//! session_ttl_minutes = 1440
//! persist_retry_secs = 30
//!
//! [hosted]
//! secret_key = "sk_live_..."
//! webhook_secret = "whsec_..."
//!
//! [two_phase]
//! client_id = "..."
//! client_secret = "..."
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use storefront_checkout::{CheckoutSettings, HostedSessionConfig, TwoPhaseConfig};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "STOREFRONT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "storefront.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to call the API from a browser. Empty means any.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How often stale checkout sessions are marked expired.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("storefront.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
            max_connections: default_max_connections(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// =============================================================================
// ApiConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub hosted: HostedSessionConfig,

    #[serde(default)]
    pub two_phase: TwoPhaseConfig,
}

impl ApiConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    pub fn load() -> ConfigResult<Self> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            info!(?path, "Loading config from file");
            Self::from_file(&path)?
        } else {
            if explicit.is_some() {
                warn!(?path, "Config file not found, using defaults");
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        if config.hosted.webhook_secret.is_empty() {
            warn!("No hosted webhook secret configured, webhooks will be rejected");
        }
        if config.two_phase.client_id.is_empty() {
            warn!("No two-phase client id configured");
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Applies `STOREFRONT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("STOREFRONT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("STOREFRONT_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::invalid("STOREFRONT_PORT", port))?;
            debug!(port = self.server.port, "Overriding port from environment");
        }
        if let Some(path) = lookup("STOREFRONT_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        // Secrets normally arrive this way rather than through the file
        if let Some(key) = lookup("STOREFRONT_HOSTED_SECRET_KEY") {
            self.hosted.secret_key = key;
        }
        if let Some(secret) = lookup("STOREFRONT_HOSTED_WEBHOOK_SECRET") {
            self.hosted.webhook_secret = secret;
        }
        if let Some(id) = lookup("STOREFRONT_TWO_PHASE_CLIENT_ID") {
            self.two_phase.client_id = id;
        }
        if let Some(secret) = lookup("STOREFRONT_TWO_PHASE_CLIENT_SECRET") {
            self.two_phase.client_secret = secret;
        }

        if let Some(url) = lookup("STOREFRONT_SUCCESS_URL") {
            self.checkout.success_url = url;
        }
        if let Some(url) = lookup("STOREFRONT_CANCEL_URL") {
            self.checkout.cancel_url = url;
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be greater than 0"));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be greater than 0",
            ));
        }
        if self.database.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "database.sweep_interval_secs",
                "must be greater than 0",
            ));
        }

        let currency = &self.checkout.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::invalid(
                "checkout.currency",
                format!("expected an ISO 4217 code, got {:?}", currency),
            ));
        }
        if self.checkout.amount_tolerance_cents < 0 {
            return Err(ConfigError::invalid(
                "checkout.amount_tolerance_cents",
                "must not be negative",
            ));
        }
        if self.checkout.session_ttl_minutes <= 0 {
            return Err(ConfigError::invalid(
                "checkout.session_ttl_minutes",
                "must be positive",
            ));
        }

        for (key, url) in [
            ("checkout.success_url", &self.checkout.success_url),
            ("checkout.cancel_url", &self.checkout.cancel_url),
            ("hosted.api_base", &self.hosted.api_base),
            ("two_phase.api_base", &self.two_phase.api_base),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(
                    key,
                    format!("must start with http:// or https://, got: {}", url),
                ));
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
