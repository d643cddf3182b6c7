//! Process configuration, read from environment variables.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use workboard_auth::DEFAULT_TOKEN_TTL_SECS;

use crate::billing::StripeConfig;
use crate::billing::stripe::DEFAULT_STRIPE_API_BASE;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,
    /// `None` when `STRIPE_SECRET` or `STRIPE_PRICE_ID` is unset.
    pub stripe: Option<StripeConfig>,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET is not set; using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            }),
            None => None,
        };

        let stripe = match (get("STRIPE_SECRET"), get("STRIPE_PRICE_ID")) {
            (Some(secret_key), Some(price_id)) => Some(StripeConfig {
                secret_key,
                price_id,
                api_base: get("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
                success_url: get("BILLING_SUCCESS_URL")
                    .unwrap_or_else(|| "http://localhost:5173/billing/success".to_string()),
                cancel_url: get("BILLING_CANCEL_URL")
                    .unwrap_or_else(|| "http://localhost:5173/billing/cancel".to_string()),
            }),
            _ => None,
        };

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let jwt_ttl_secs: i64 = parse_or(&get, "JWT_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if jwt_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_SECS",
                value: jwt_ttl_secs.to_string(),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 5555)?,
            jwt_secret,
            jwt_ttl_secs,
            database,
            stripe,
            cors_origins,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:5555");
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.jwt_ttl_secs, 604_800);
        assert_eq!(config.database, None);
        assert_eq!(config.stripe, None);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173".to_string()]);
    }

    #[test]
    fn reads_database_and_stripe() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/workboard"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("STRIPE_SECRET", "sk_test"),
            ("STRIPE_PRICE_ID", "price_1"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();

        let db = config.database.unwrap();
        assert_eq!(db.max_connections, 4);
        let stripe = config.stripe.unwrap();
        assert_eq!(stripe.price_id, "price_1");
        assert_eq!(stripe.api_base, DEFAULT_STRIPE_API_BASE);
        assert_eq!(stripe.success_url, "http://localhost:5173/billing/success");
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn stripe_needs_both_secret_and_price() {
        let config = config_from(&[("STRIPE_SECRET", "sk_test")]).unwrap();
        assert_eq!(config.stripe, None);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert_eq!(
            config_from(&[("PORT", "http")]),
            Err(ConfigError::Invalid {
                key: "PORT",
                value: "http".to_string()
            })
        );
        assert!(config_from(&[("JWT_TTL_SECS", "0")]).is_err());
    }
}
