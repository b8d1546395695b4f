//! Layered configuration: built-in defaults, optional `campus.toml` (or the
//! file named by `CAMPUS_CONFIG`), then `CAMPUS__SECTION__KEY` environment
//! overrides.

use anyhow::{Context, Result};
use config::{Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub payment: PaymentConfig,
    pub imports: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub otp_ttl_secs: u64,
    /// Wrong codes tolerated before the pending code is dropped.
    pub otp_max_attempts: u32,
    pub session_idle_hours: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub from: Option<String>,
    pub cc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub merchant: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub assets_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig {
                bind_address: "0.0.0.0:3000".to_string(),
            },
            database: DatabaseConfig {
                path: "data/campus.db".to_string(),
            },
            cache: CacheConfig {
                default_ttl_secs: 3600,
            },
            auth: AuthConfig {
                jwt_secret: DEFAULT_JWT_SECRET.to_string(),
                token_ttl_hours: 24,
                otp_ttl_secs: 300,
                otp_max_attempts: 5,
                session_idle_hours: 12,
                cleanup_interval_secs: 300,
            },
            mail: MailConfig::default(),
            payment: PaymentConfig {
                api_url: "https://api.flexpay.cd".to_string(),
                token: None,
                merchant: "INBTP".to_string(),
                callback_url: None,
            },
            imports: ImportConfig {
                assets_dir: PathBuf::from("assets"),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = std::env::var("CAMPUS_CONFIG").unwrap_or_else(|_| "campus.toml".to_string());
        info!("Loading configuration from {} (optional)", path);

        let defaults = config::Config::try_from(&Config::default())
            .context("Failed to build default configuration")?;

        let config: Config = config::Config::builder()
            .add_source(defaults)
            .add_source(File::from(PathBuf::from(&path)).required(false))
            .add_source(
                Environment::with_prefix("CAMPUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build config")?
            .try_deserialize()
            .context("Failed to deserialize config")?;

        if config.auth.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("auth.jwt_secret not set, using default (insecure for production)");
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_secs)
    }
}
