//! Configuration loading
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/tally/config.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! `TALLY_*` environment variables are applied on top by `apply_env`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Local, Offset};
use serde::Deserialize;
use tracing::debug;

use crate::currency::CurrencySettings;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/tally.toml");

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GatewayBackend {
    #[default]
    Sqlite,
    Rest,
    Mock,
}

impl std::str::FromStr for GatewayBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "rest" => Ok(Self::Rest),
            "mock" => Ok(Self::Mock),
            other => Err(format!("Unknown gateway backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub backend: GatewayBackend,
    pub db_path: PathBuf,
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
    /// Bearer token of the signed-in user for the REST backend
    pub rest_access_token: Option<String>,
    /// Per-request timeout for the REST backend
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: GatewayBackend::Sqlite,
            db_path: default_db_path(),
            rest_url: None,
            rest_api_key: None,
            rest_access_token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Base URL of the translation service
    pub endpoint: String,
    pub source_lang: String,
    /// Total attempts per text, including the first
    pub max_retries: u32,
    /// Backoff unit; attempt n waits n × this
    pub retry_delay: Duration,
    /// Keys translated in parallel
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com".to_string(),
            source_lang: "en".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            concurrency: 8,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayConfig {
    pub utc_offset_minutes: Option<i32>,
}

impl DisplayConfig {
    /// The offset used for local day boundaries
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
            .unwrap_or_else(|| Local::now().offset().fix())
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub gateway: GatewayConfig,
    /// Id of the signed-in user
    pub user_id: Option<String>,
    pub translation: TranslationConfig,
    pub currency: CurrencySettings,
    pub display: DisplayConfig,
}

impl Config {
    /// Load from `path` if given, else the data-dir override, else embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => {
                    debug!(path = %default_path.display(), "Using config override");
                    fs::read_to_string(&default_path).map_err(|e| {
                        Error::Config(format!("Failed to read {}: {}", default_path.display(), e))
                    })?
                }
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        parse_config(&content)
    }

    /// Load and then apply `TALLY_*` environment overrides
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides read through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = var("TALLY_GATEWAY") {
            self.gateway.backend = backend.parse().map_err(Error::Config)?;
        }
        if let Some(path) = var("TALLY_DB") {
            self.gateway.db_path = PathBuf::from(path);
        }
        if let Some(url) = var("TALLY_REST_URL") {
            self.gateway.rest_url = Some(url);
        }
        if let Some(key) = var("TALLY_REST_API_KEY") {
            self.gateway.rest_api_key = Some(key);
        }
        if let Some(user) = var("TALLY_USER") {
            self.user_id = Some(user);
        }
        if let Some(endpoint) = var("TALLY_TRANSLATE_URL") {
            self.translation.endpoint = endpoint;
        }
        if let Some(currency) = var("TALLY_CURRENCY") {
            self.currency = CurrencySettings::new(&currency, self.currency.rate);
        }
        if let Some(rate) = var("TALLY_CURRENCY_RATE") {
            let rate: f64 = rate
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid TALLY_CURRENCY_RATE: {}", rate)))?;
            self.currency.rate = Some(rate);
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config.toml"))
}

/// Default SQLite database location
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tally").join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    gateway: Option<RawGateway>,
    identity: Option<RawIdentity>,
    translation: Option<RawTranslation>,
    currency: Option<RawCurrency>,
    display: Option<RawDisplay>,
}

#[derive(Debug, Deserialize)]
struct RawGateway {
    backend: Option<String>,
    db_path: Option<PathBuf>,
    rest_url: Option<String>,
    rest_api_key: Option<String>,
    rest_access_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawIdentity {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTranslation {
    endpoint: Option<String>,
    source_lang: Option<String>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawCurrency {
    selected: Option<String>,
    rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDisplay {
    utc_offset_minutes: Option<i32>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig =
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();

    if let Some(gateway) = raw.gateway {
        if let Some(backend) = gateway.backend {
            config.gateway.backend = backend.parse().map_err(Error::Config)?;
        }
        if let Some(path) = gateway.db_path {
            config.gateway.db_path = path;
        }
        config.gateway.rest_url = gateway.rest_url;
        config.gateway.rest_api_key = gateway.rest_api_key;
        config.gateway.rest_access_token = gateway.rest_access_token;
        if let Some(secs) = gateway.timeout_secs {
            config.gateway.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(identity) = raw.identity {
        config.user_id = identity.user_id;
    }

    if let Some(translation) = raw.translation {
        if let Some(endpoint) = translation.endpoint {
            config.translation.endpoint = endpoint;
        }
        if let Some(source) = translation.source_lang {
            config.translation.source_lang = source;
        }
        if let Some(retries) = translation.max_retries {
            // At least one attempt
            config.translation.max_retries = retries.max(1);
        }
        if let Some(delay) = translation.retry_delay_ms {
            config.translation.retry_delay = Duration::from_millis(delay);
        }
        if let Some(concurrency) = translation.concurrency {
            config.translation.concurrency = concurrency.max(1);
        }
        if let Some(secs) = translation.timeout_secs {
            config.translation.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(currency) = raw.currency {
        let selected = currency
            .selected
            .unwrap_or_else(|| config.currency.selected.clone());
        config.currency = CurrencySettings::new(&selected, currency.rate);
    }

    if let Some(display) = raw.display {
        config.display.utc_offset_minutes = display.utc_offset_minutes;
    }

    Ok(config)
}
