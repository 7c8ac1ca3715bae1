//! Process configuration, read once at startup.
//!
//! [`AppConfig::from_lookup`] is a pure function over a key lookup, so tests
//! can feed it a map; [`AppConfig::from_env`] wires it to the process
//! environment after loading an optional `.env` file.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

use flame_auth::parse_ttl;
pub use flame_observability::LogFormat;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";
pub const DEFAULT_JWT_EXPIRE: &str = "30d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: &'static str) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason,
        }
    }
}

/// How order placement takes stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StockReservation {
    /// Conditional decrement in the store (`stock >= qty`), no oversell.
    #[default]
    Atomic,
    /// Check every line, then decrement unconditionally. Two concurrent
    /// orders can both pass the check.
    Legacy,
}

impl FromStr for StockReservation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "legacy" => Ok(Self::Legacy),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was not set and the built-in default is used.
    pub jwt_secret_is_default: bool,
    pub jwt_ttl: Duration,
    pub database_url: Option<String>,
    pub stock_reservation: StockReservation,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_secret_is_default: true,
            jwt_ttl: Duration::days(30),
            database_url: None,
            stock_reservation: StockReservation::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Build the config from `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::invalid("PORT", &raw, "expected a port number"))?,
            None => DEFAULT_PORT,
        };

        let (jwt_secret, jwt_secret_is_default) = match get("JWT_SECRET") {
            Some(secret) => (secret, false),
            None => (DEFAULT_JWT_SECRET.to_string(), true),
        };

        let expire = get("JWT_EXPIRE").unwrap_or_else(|| DEFAULT_JWT_EXPIRE.to_string());
        let jwt_ttl = parse_ttl(&expire)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| ConfigError::invalid("JWT_EXPIRE", &expire, "expected e.g. 30d, 12h, 45m or seconds"))?;

        let stock_reservation = match get("STOCK_RESERVATION") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid("STOCK_RESERVATION", &raw, "expected atomic or legacy"))?,
            None => StockReservation::default(),
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid("LOG_FORMAT", &raw, "expected json or pretty"))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            port,
            jwt_secret,
            jwt_secret_is_default,
            jwt_ttl,
            database_url: get("DATABASE_URL"),
            stock_reservation,
            log_format,
        })
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = AppConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.jwt_secret_is_default);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let map = HashMap::from([
            ("PORT", "8080"),
            ("JWT_SECRET", " s3cret "),
            ("JWT_EXPIRE", "12h"),
            ("DATABASE_URL", "postgres://localhost/flame"),
            ("STOCK_RESERVATION", "Legacy"),
            ("LOG_FORMAT", "pretty"),
        ]);
        let cfg = AppConfig::from_map(&map).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert!(!cfg.jwt_secret_is_default);
        assert_eq!(cfg.jwt_ttl, Duration::hours(12));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/flame"));
        assert_eq!(cfg.stock_reservation, StockReservation::Legacy);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let map = HashMap::from([("DATABASE_URL", "  "), ("PORT", "")]);
        let cfg = AppConfig::from_map(&map).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn bad_values_are_rejected_with_the_key() {
        let err = AppConfig::from_map(&HashMap::from([("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = AppConfig::from_map(&HashMap::from([("STOCK_RESERVATION", "yolo")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "STOCK_RESERVATION", .. }));

        assert!(AppConfig::from_map(&HashMap::from([("JWT_EXPIRE", "soon")])).is_err());
        assert!(AppConfig::from_map(&HashMap::from([("LOG_FORMAT", "xml")])).is_err());
    }
}
