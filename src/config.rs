//! Process configuration (strict YAML).

use std::fs;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Env var that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PIZZA_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pizza.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config '{path}' failed: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ─── Schema ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    pub auth: AuthSection,

    pub metrics: MetricsSection,

    pub factory: FactorySection,

    /// Account seeded at startup so the first admin can log in.
    #[serde(default)]
    pub admin: Option<AdminSeed>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    pub jwt_secret: String,

    /// Absent means tokens stay valid until logout.
    #[serde(default)]
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    pub source: String,
    pub url: String,
    pub user_id: String,
    pub api_key: String,

    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl MetricsSection {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactorySection {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_period_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

// ─── Loading ─────────────────────────────────────────────────────

/// Load from `$PIZZA_CONFIG`, falling back to `pizza.yaml`.
pub fn load() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<Config> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config = serde_yaml::from_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(
                "server.listen must be a valid socket address".into(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.token_ttl_secs == Some(0) {
            return Err(ConfigError::Invalid("auth.token_ttl_secs must be positive".into()));
        }
        if self.metrics.period_ms == 0 {
            return Err(ConfigError::Invalid("metrics.period_ms must be positive".into()));
        }
        if self.metrics.source.is_empty() {
            return Err(ConfigError::Invalid("metrics.source must not be empty".into()));
        }
        Ok(())
    }
}
