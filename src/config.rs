use std::env;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub relay_webhook_url: Option<String>,
    pub relay_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))?,
            Err(_) => 5,
        };
        let relay_timeout_secs: u64 = match env::var("RELAY_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("RELAY_TIMEOUT_SECS is not a number: {raw}"))?,
            Err(_) => 30,
        };

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections,
            relay_webhook_url: non_empty_var("RELAY_WEBHOOK_URL"),
            relay_timeout: Duration::from_secs(relay_timeout_secs),
            log_level: non_empty_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the school Postgres instance")
    }

    pub fn require_relay_webhook_url(&self) -> anyhow::Result<&str> {
        self.relay_webhook_url
            .as_deref()
            .context("RELAY_WEBHOOK_URL must be set to use the assistant relay")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: None,
            database_max_connections: 5,
            relay_webhook_url: Some("https://hooks.example.org/chat".to_string()),
            relay_timeout: Duration::from_secs(30),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = config().require_database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn relay_url_is_returned_when_set() {
        let config = config();
        assert_eq!(
            config.require_relay_webhook_url().unwrap(),
            "https://hooks.example.org/chat"
        );
    }
}
