use std::str::FromStr;
use std::time::Duration;

use geodrop_core::proximity::DEFAULT_PROXIMITY_THRESHOLD_METERS;

/// A configuration variable that could not be used.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Server-authoritative nearby radius in meters (default: `100`).
    pub proximity_threshold_meters: f64,
    /// Sessions silent for longer than this are evicted (default: 30s).
    pub session_timeout: Duration,
    /// How often the reaper runs (default: 10s).
    pub reaper_interval: Duration,
    /// How often every transport is pinged (default: 30s).
    pub heartbeat_interval: Duration,
    /// Per-message cap on inbound WebSocket frames. `None` keeps axum's default.
    pub ws_max_message_bytes: Option<usize>,
    /// Upper bound on waiting for background tasks at shutdown (default: 5s).
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            proximity_threshold_meters: DEFAULT_PROXIMITY_THRESHOLD_METERS,
            session_timeout: Duration::from_secs(30),
            reaper_interval: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            ws_max_message_bytes: None,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default   |
    /// |------------------------------|-----------|
    /// | `HOST`                       | `0.0.0.0` |
    /// | `PORT`                       | `8080`    |
    /// | `PROXIMITY_THRESHOLD_METERS` | `100`     |
    /// | `SESSION_TIMEOUT_SECS`       | `30`      |
    /// | `REAPER_INTERVAL_SECS`       | `10`      |
    /// | `HEARTBEAT_INTERVAL_SECS`    | `30`      |
    /// | `WS_MAX_MESSAGE_BYTES`       | unset     |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `5`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse_or(&lookup, "PORT", defaults.port)?;

        let proximity_threshold_meters = parse_or(
            &lookup,
            "PROXIMITY_THRESHOLD_METERS",
            defaults.proximity_threshold_meters,
        )?;
        if !proximity_threshold_meters.is_finite() || proximity_threshold_meters < 0.0 {
            return Err(ConfigError {
                key: "PROXIMITY_THRESHOLD_METERS",
                value: proximity_threshold_meters.to_string(),
                reason: "must be a finite, non-negative number of meters".into(),
            });
        }

        let session_timeout = secs_or(&lookup, "SESSION_TIMEOUT_SECS", defaults.session_timeout)?;
        let reaper_interval = secs_or(&lookup, "REAPER_INTERVAL_SECS", defaults.reaper_interval)?;
        let heartbeat_interval =
            secs_or(&lookup, "HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval)?;
        let shutdown_timeout =
            secs_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout)?;

        let ws_max_message_bytes = match lookup("WS_MAX_MESSAGE_BYTES") {
            Some(raw) => Some(parse_value("WS_MAX_MESSAGE_BYTES", &raw)?),
            None => None,
        };

        Ok(Self {
            host,
            port,
            proximity_threshold_meters,
            session_timeout,
            reaper_interval,
            heartbeat_interval,
            ws_max_message_bytes,
            shutdown_timeout,
        })
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

/// Parse a whole number of seconds; zero is rejected because every duration
/// here drives a timer.
fn secs_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(lookup, key, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError {
            key,
            value: "0".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
