//! Process configuration, read once at startup and handed to whoever needs it.

use std::fmt;

use chrono::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DATABASE: &str = "WealthSplit";
pub const DEFAULT_AUTH_MAX_AGE_SECS: i64 = 86_400;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173";
pub const DEFAULT_UPI_CURRENCY: &str = "INR";
pub const DEFAULT_UPI_NOTE: &str = "WealthSplit settlement";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct AuthConfig {
    pub bot_token: String,
    /// Oldest Telegram login payload still accepted.
    pub max_age: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bot_token", &"<redacted>")
            .field("max_age", &self.max_age)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpiConfig {
    pub currency: String,
    pub default_note: String,
}

impl Default for UpiConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_UPI_CURRENCY.to_string(),
            default_note: DEFAULT_UPI_NOTE.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// `None` runs on the in-memory store.
    pub mongodb: Option<MongoConfig>,
    pub auth: AuthConfig,
    pub cors_origins: Vec<String>,
    pub upi: UpiConfig,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("BOT_API_TOKEN").ok_or(ConfigError::Missing("BOT_API_TOKEN"))?;
        let max_age_secs = match get("AUTH_MAX_AGE_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "AUTH_MAX_AGE_SECS",
                    reason: format!("expected a positive number of seconds, got {raw:?}"),
                })?,
            None => DEFAULT_AUTH_MAX_AGE_SECS,
        };
        let seed_demo_data = match get("SEED_DEMO_DATA") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "SEED_DEMO_DATA",
                reason: format!("expected true or false, got {raw:?}"),
            })?,
            None => false,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            mongodb: get("MONGODB_URI").map(|uri| MongoConfig {
                uri,
                database: get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            }),
            auth: AuthConfig {
                bot_token,
                max_age: Duration::seconds(max_age_secs),
            },
            cors_origins: get("CORS_ORIGINS")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            upi: UpiConfig {
                currency: get("UPI_CURRENCY").unwrap_or_else(|| DEFAULT_UPI_CURRENCY.to_string()),
                default_note: get("UPI_DEFAULT_NOTE")
                    .unwrap_or_else(|| DEFAULT_UPI_NOTE.to_string()),
            },
            seed_demo_data,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = Config::from_lookup(lookup(&[("BOT_API_TOKEN", "t")])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert!(config.mongodb.is_none());
        assert_eq!(config.auth.max_age, Duration::seconds(DEFAULT_AUTH_MAX_AGE_SECS));
        assert_eq!(config.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(config.upi, UpiConfig::default());
        assert!(!config.seed_demo_data);
    }

    #[test]
    fn bot_token_is_required() {
        let err = Config::from_lookup(lookup(&[("BOT_API_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("BOT_API_TOKEN")));
    }

    #[test]
    fn reads_every_setting() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_API_TOKEN", "t"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MONGODB_DATABASE", "test"),
            ("AUTH_MAX_AGE_SECS", "60"),
            ("CORS_ORIGINS", "https://a.example, ,https://b.example"),
            ("UPI_CURRENCY", "USD"),
            ("SEED_DEMO_DATA", "yes"),
        ]))
        .unwrap();
        let mongo = config.mongodb.unwrap();
        assert_eq!(mongo.database, "test");
        assert_eq!(config.auth.max_age, Duration::seconds(60));
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.upi.currency, "USD");
        assert!(config.seed_demo_data);
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("BOT_API_TOKEN", "t"),
            ("AUTH_MAX_AGE_SECS", "-5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AUTH_MAX_AGE_SECS", .. }));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let config = Config::from_lookup(lookup(&[("BOT_API_TOKEN", "secret-token")])).unwrap();
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
