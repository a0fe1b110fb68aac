//! Configuration management for ProfileVault
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).
//! Token signing secrets are mandatory: a process without them must not start.

use std::env;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use thiserror::Error;

/// Lowest bcrypt work factor the hasher accepts
pub const MIN_BCRYPT_COST: u32 = 4;
/// Highest bcrypt work factor the hasher accepts
pub const MAX_BCRYPT_COST: u32 = 31;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Credentials for the Cloudinary media store
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origin
    pub cors_origin: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Secret used to sign access tokens
    pub access_token_secret: String,

    /// Access token lifetime
    pub access_token_expiry: Duration,

    /// Secret used to sign refresh tokens, distinct from the access secret
    pub refresh_token_secret: String,

    /// Refresh token lifetime
    pub refresh_token_expiry: Duration,

    /// bcrypt work factor for password hashes
    pub bcrypt_cost: u32,

    /// Directory where incoming attachments are staged before upload
    pub upload_dir: PathBuf,

    /// Maximum accepted request body size for uploads
    pub max_upload_bytes: usize,

    /// Media store credentials; `None` falls back to the in-memory store outside production
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let environment = lookup("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = required("DATABASE_URL")?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = lookup("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let cors_origin = lookup("CORS_ORIGIN").filter(|v| !v.is_empty());

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        // Token configuration
        let access_token_secret = required("ACCESS_TOKEN_SECRET")?;
        let access_token_expiry = parse_expiry(&required("ACCESS_TOKEN_EXPIRY")?)?;
        let refresh_token_secret = required("REFRESH_TOKEN_SECRET")?;
        let refresh_token_expiry = parse_expiry(&required("REFRESH_TOKEN_EXPIRY")?)?;

        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|cost| (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(cost))
                .ok_or_else(|| {
                    ConfigError::InvalidValue(format!("BCRYPT_COST out of range: '{}'", raw))
                })?,
            None => bcrypt::DEFAULT_COST,
        };

        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./public/temp"));

        let max_upload_bytes = lookup("MAX_UPLOAD_BYTES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10 * 1024 * 1024);

        let cloudinary = match (
            lookup("CLOUDINARY_CLOUD_NAME"),
            lookup("CLOUDINARY_API_KEY"),
            lookup("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must be set together"
                        .to_string(),
                ))
            }
        };

        if cloudinary.is_none() && environment.is_production() {
            return Err(ConfigError::MissingEnvVar(
                "CLOUDINARY_CLOUD_NAME".to_string(),
            ));
        }

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            cors_origin,
            log_level,
            access_token_secret,
            access_token_expiry,
            refresh_token_secret,
            refresh_token_expiry,
            bcrypt_cost,
            upload_dir,
            max_upload_bytes,
            cloudinary,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }

    /// Whether auth cookies must carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

/// Parse a token lifetime such as `900`, `15m`, `1h` or `10d`
pub fn parse_expiry(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::InvalidValue(format!("Invalid token expiry: '{}'", raw));

    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        Some(_) => (raw, None),
        None => return Err(invalid()),
    };

    let amount = digits.parse::<i64>().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }

    let ttl = match unit {
        None | Some('s') => Duration::try_seconds(amount),
        Some('m') => Duration::try_minutes(amount),
        Some('h') => Duration::try_hours(amount),
        Some('d') => Duration::try_days(amount),
        Some(_) => None,
    }
    .ok_or_else(invalid)?;

    // every token signed with this lifetime needs a representable expiry
    Utc::now().checked_add_signed(ttl).ok_or_else(invalid)?;

    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgresql://user:pw@localhost/profilevault".to_string()),
            ("ACCESS_TOKEN_SECRET", "access-secret".to_string()),
            ("ACCESS_TOKEN_EXPIRY", "1d".to_string()),
            ("REFRESH_TOKEN_SECRET", "refresh-secret".to_string()),
            ("REFRESH_TOKEN_EXPIRY", "10d".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("dev").unwrap(), Environment::Development);
        assert_eq!(Environment::parse("staging").unwrap(), Environment::Staging);
        assert_eq!(Environment::parse("PROD").unwrap(), Environment::Production);
        assert!(Environment::parse("invalid").is_err());
    }

    #[test]
    fn test_parse_expiry_units() {
        assert_eq!(parse_expiry("900").unwrap(), Duration::seconds(900));
        assert_eq!(parse_expiry("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_expiry("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_expiry("10d").unwrap(), Duration::days(10));
        assert!(parse_expiry("").is_err());
        assert!(parse_expiry("0").is_err());
        assert!(parse_expiry("5w").is_err());
        assert!(parse_expiry("abc").is_err());
    }

    #[test]
    fn test_parse_expiry_rejects_overflowing_units() {
        assert!(matches!(
            parse_expiry("99999999999999d"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            parse_expiry("9999999999999999h"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_parse_expiry_rejects_unrepresentable_expiry() {
        // fits in a duration, but now + ttl is past the last representable date
        assert!(matches!(
            parse_expiry("9000000000000000"),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_oversized_refresh_expiry_fails_config_load() {
        let mut env = base_env();
        env.insert("REFRESH_TOKEN_EXPIRY", "99999999999999d".to_string());
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_bcrypt_cost_bounds() {
        let mut env = base_env();
        env.insert("BCRYPT_COST", MIN_BCRYPT_COST.to_string());
        assert_eq!(load(&env).unwrap().bcrypt_cost, MIN_BCRYPT_COST);

        env.insert("BCRYPT_COST", (MAX_BCRYPT_COST + 1).to_string());
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue(_))));

        env.insert("BCRYPT_COST", (MIN_BCRYPT_COST - 1).to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_loads_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.access_token_expiry, Duration::days(1));
        assert_eq!(config.refresh_token_expiry, Duration::days(10));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.cloudinary.is_none());
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_missing_token_secret_is_fatal() {
        for key in [
            "ACCESS_TOKEN_SECRET",
            "ACCESS_TOKEN_EXPIRY",
            "REFRESH_TOKEN_SECRET",
            "REFRESH_TOKEN_EXPIRY",
        ] {
            let mut env = base_env();
            env.remove(key);
            match load(&env) {
                Err(ConfigError::MissingEnvVar(name)) => assert_eq!(name, key),
                other => panic!("expected missing {}, got {:?}", key, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_shared_secret_rejected() {
        let mut env = base_env();
        env.insert("REFRESH_TOKEN_SECRET", "access-secret".to_string());
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_partial_cloudinary_rejected() {
        let mut env = base_env();
        env.insert("CLOUDINARY_CLOUD_NAME", "demo".to_string());
        assert!(matches!(load(&env), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_production_requires_media_store() {
        let mut env = base_env();
        env.insert("ENVIRONMENT", "production".to_string());
        assert!(load(&env).is_err());

        env.insert("CLOUDINARY_CLOUD_NAME", "demo".to_string());
        env.insert("CLOUDINARY_API_KEY", "key".to_string());
        env.insert("CLOUDINARY_API_SECRET", "secret".to_string());
        let config = load(&env).unwrap();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_config_database_url_masked() {
        let config = load(&base_env()).unwrap();
        let masked = config.database_url_masked();
        assert!(masked.contains("****"));
        assert!(!masked.contains(":pw@"));
    }
}
