use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Top-level config ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Timeouts ─────────────────────────────────────────────────────

/// Per-operation timeouts, in seconds. Each leaf probe derives its own
/// deadline from these and from the evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_dns_lookup_secs")]
    pub dns_lookup_secs: u64,

    #[serde(default = "default_tcp_connect_secs")]
    pub tcp_connect_secs: u64,

    #[serde(default = "default_handshake_secs")]
    pub tls_handshake_secs: u64,

    #[serde(default = "default_handshake_secs")]
    pub quic_handshake_secs: u64,

    #[serde(default = "default_http_transaction_secs")]
    pub http_transaction_secs: u64,

    /// Bound on the whole evaluation; 0 means unbounded.
    #[serde(default)]
    pub evaluation_secs: u64,
}

fn default_dns_lookup_secs() -> u64 {
    4
}

fn default_tcp_connect_secs() -> u64 {
    15
}

fn default_handshake_secs() -> u64 {
    10
}

fn default_http_transaction_secs() -> u64 {
    10
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            dns_lookup_secs: default_dns_lookup_secs(),
            tcp_connect_secs: default_tcp_connect_secs(),
            tls_handshake_secs: default_handshake_secs(),
            quic_handshake_secs: default_handshake_secs(),
            http_transaction_secs: default_http_transaction_secs(),
            evaluation_secs: 0,
        }
    }
}

impl TimeoutsConfig {
    pub fn dns_lookup(&self) -> Duration {
        Duration::from_secs(self.dns_lookup_secs)
    }

    pub fn tcp_connect(&self) -> Duration {
        Duration::from_secs(self.tcp_connect_secs)
    }

    pub fn tls_handshake(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_secs)
    }

    pub fn quic_handshake(&self) -> Duration {
        Duration::from_secs(self.quic_handshake_secs)
    }

    pub fn http_transaction(&self) -> Duration {
        Duration::from_secs(self.http_transaction_secs)
    }

    /// `None` when the evaluation is unbounded.
    pub fn evaluation(&self) -> Option<Duration> {
        (self.evaluation_secs > 0).then(|| Duration::from_secs(self.evaluation_secs))
    }
}

// ── HTTP ─────────────────────────────────────────────────────────

/// Request headers and limits used when a program does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept")]
    pub accept: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_response_body_snapshot_size")]
    pub response_body_snapshot_size: usize,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".into()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into()
}

fn default_accept_language() -> String {
    "en-US;q=0.8,en;q=0.5".into()
}

fn default_response_body_snapshot_size() -> usize {
    1 << 19
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            response_body_snapshot_size: default_response_body_snapshot_size(),
        }
    }
}

// ── Logging ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        self.level.parse().map_err(|_| {
            ConfigError::Validation(format!("logging.level: unknown level {:?}", self.level))
        })
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Config {
    /// `~/.microprobe/config.toml`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        UserDirs::new().map(|u| u.home_dir().join(".microprobe").join("config.toml"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Loads `explicit` if given (it must exist), else the default path if
    /// it exists, else the defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path)
                .with_context(|| format!("Failed to load config file {}", path.display()));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)
                .with_context(|| format!("Failed to load config file {}", path.display())),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timeouts;
        for (name, value) in [
            ("timeouts.dns_lookup_secs", t.dns_lookup_secs),
            ("timeouts.tcp_connect_secs", t.tcp_connect_secs),
            ("timeouts.tls_handshake_secs", t.tls_handshake_secs),
            ("timeouts.quic_handshake_secs", t.quic_handshake_secs),
            ("timeouts.http_transaction_secs", t.http_transaction_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be > 0")));
            }
        }
        if self.http.response_body_snapshot_size == 0 {
            return Err(ConfigError::Validation(
                "http.response_body_snapshot_size must be > 0".into(),
            ));
        }
        self.logging.level()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
