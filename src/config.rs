use std::{
    env,
    fmt::{self, Display},
    str::FromStr,
};

use log::{info, warn};

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, info: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "Environment variable {key} is required"),
            ConfigError::Invalid { key, info } => write!(f, "Invalid {key} value: {info}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_hours: i64,
    pub media_root: String,
    pub media_url: String,
    pub database_max_connections: u32,
    pub body_limit_bytes: u64,
}

impl Config {
    /// Reads the process environment, after merging a `.env` file when there is one.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            info!("No .env file loaded: {e}");
        }

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            port: try_load("PORT", "8000")?,
            jwt_secret: require("JWT_SECRET")?,
            session_hours: try_load("SESSION_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "./media")?,
            media_url: try_load("MEDIA_URL", "/media/")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            body_limit_bytes: try_load("BODY_LIMIT_BYTES", "10485760")?,
        })
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_value(key, env::var(key).ok(), default)
}

fn parse_value<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                info: e.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults() {
        let port: u16 = parse_value("PORT", None, "8000").unwrap();
        assert_eq!(port, 8000);

        let hours: i64 = parse_value("SESSION_HOURS", Some("48".into()), "24").unwrap();
        assert_eq!(hours, 48);
    }

    #[test]
    fn names_the_broken_key() {
        let error = parse_value::<u16>("PORT", Some("eighty".into()), "8000").unwrap_err();
        assert!(error.to_string().starts_with("Invalid PORT value"));
        assert_eq!(
            ConfigError::Missing("JWT_SECRET").to_string(),
            "Environment variable JWT_SECRET is required"
        );
    }
}
