use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
    pub cache: CacheConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("SPINWHEEL_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("SPINWHEEL_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        self.engine.ensure_bounds()?;
        self.rate_limiting.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Prefix on generated coupon codes
    #[serde(default = "EngineConfig::default_coupon_prefix")]
    pub coupon_prefix: String,
    /// Coupon lifetime from the moment of allocation
    #[serde(default = "EngineConfig::default_coupon_ttl_days")]
    pub coupon_ttl_days: i64,
    /// Whole-transaction retries when concurrent spins collide
    #[serde(default = "EngineConfig::default_max_attempts")]
    pub max_attempts: u32,
}

impl EngineConfig {
    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(
            !self.coupon_prefix.is_empty(),
            "Coupon prefix must be non-empty"
        );
        assert!(
            self.coupon_prefix.len() <= 16,
            "Coupon prefix exceeds defensive limit"
        );
        assert!(
            self.coupon_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric()),
            "Coupon prefix must be alphanumeric"
        );
        assert!(self.coupon_ttl_days >= 1, "Coupon TTL must be at least a day");
        assert!(
            self.coupon_ttl_days <= 365,
            "Coupon TTL cannot exceed a year"
        );
        assert!(self.max_attempts >= 1, "At least one allocation attempt");
        assert!(
            self.max_attempts <= 10,
            "Allocation attempts exceed defensive limit"
        );
        Ok(())
    }

    fn default_coupon_prefix() -> String {
        "GATEWAY".to_string()
    }

    const fn default_coupon_ttl_days() -> i64 {
        30
    }

    const fn default_max_attempts() -> u32 {
        3
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coupon_prefix: Self::default_coupon_prefix(),
            coupon_ttl_days: Self::default_coupon_ttl_days(),
            max_attempts: Self::default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitingConfig {
    /// Spins allowed from one source address within the window, across all
    /// campaigns
    #[serde(default = "RateLimitingConfig::default_source_spin_limit")]
    pub source_spin_limit: u64,
    #[serde(default = "RateLimitingConfig::default_window_minutes")]
    pub window_minutes: i64,
}

impl RateLimitingConfig {
    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.source_spin_limit > 0,
            "Source spin limit must be positive"
        );
        assert!(self.window_minutes > 0, "Rate limit window must be positive");
        assert!(
            self.window_minutes <= 1_440,
            "Rate limit window cannot exceed one day"
        );
        Ok(())
    }

    const fn default_source_spin_limit() -> u64 {
        5
    }

    const fn default_window_minutes() -> i64 {
        60
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            source_spin_limit: Self::default_source_spin_limit(),
            window_minutes: Self::default_window_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub campaign_max_capacity: u64,
    pub campaign_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.campaign_max_capacity >= 1,
            "Campaign cache capacity must be at least 1"
        );
        assert!(
            self.campaign_ttl_seconds <= 3_600,
            "Campaign cache TTL cannot exceed one hour"
        );
        Ok(())
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
