use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};

use murmur_api::auth::DEFAULT_COOKIE_NAME;

/// Ten years. Keeps `now + ttl` far from the end of the representable range.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// Runtime settings, read from `MURMUR_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub cookie_name: String,
    /// Mark the session cookie `Secure`. Only sensible behind TLS.
    pub cookie_secure: bool,
    pub session_ttl_days: i64,
    pub session_sweep_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            db_path: "murmur.db".into(),
            cookie_name: DEFAULT_COOKIE_NAME.into(),
            cookie_secure: false,
            session_ttl_days: 31,
            session_sweep_secs: 3600,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key -> value source. Unset keys keep their defaults;
    /// values that fail to parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            host: lookup("MURMUR_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "MURMUR_PORT", defaults.port)?,
            db_path: lookup("MURMUR_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            cookie_name: lookup("MURMUR_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            cookie_secure: parse_or(&lookup, "MURMUR_COOKIE_SECURE", defaults.cookie_secure)?,
            session_ttl_days: parse_or(&lookup, "MURMUR_SESSION_TTL_DAYS", defaults.session_ttl_days)?,
            session_sweep_secs: parse_or(
                &lookup,
                "MURMUR_SESSION_SWEEP_SECS",
                defaults.session_sweep_secs,
            )?,
        };

        if config.cookie_name.is_empty() {
            return Err(anyhow!("MURMUR_COOKIE_NAME must not be empty"));
        }
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&config.session_ttl_days) {
            return Err(anyhow!(
                "MURMUR_SESSION_TTL_DAYS must be between 1 and {}",
                MAX_SESSION_TTL_DAYS
            ));
        }

        Ok(config)
    }

    /// Clamped to `1..=MAX_SESSION_TTL_DAYS` for configs built by hand.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days.clamp(1, MAX_SESSION_TTL_DAYS))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}
