//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// FoodShare REST API base URL (e.g. https://api.foodshare.example/api)
    pub api_base_url: String,
    /// Fixed timeout applied to every API request
    pub request_timeout_secs: u64,
    /// SQLite file holding the remembered token, notifications and tracker state
    pub database_url: String,
    /// Port for the local read API
    pub api_port: u16,
    /// How often (in seconds) the tracker re-fetches the user's donations
    pub poll_interval_secs: u64,
    /// Remaining time under which a donation counts as critical
    pub critical_countdown_minutes: i64,
    /// How long a rejected pickup code stays in the "shake" state
    pub shake_reset_ms: u64,
    /// Persist the session token across restarts
    pub remember_me: bool,
    /// Credentials used when no remembered token is available
    pub login_email: Option<String>,
    pub login_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "http://localhost:8000/api".to_string(),
            request_timeout_secs: 30,
            database_url: "sqlite:./foodshare_state.db".to_string(),
            api_port: 3002,
            poll_interval_secs: 30,
            critical_countdown_minutes: 120,
            shake_reset_ms: 600,
            remember_me: true,
            login_email: None,
            login_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        Ok(Config {
            api_base_url: env_var("API_BASE_URL")
                .unwrap_or(defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            database_url: env_var("STATE_DATABASE_URL").unwrap_or(defaults.database_url),
            api_port: parse_or("API_PORT", defaults.api_port)?,
            poll_interval_secs: parse_or("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            critical_countdown_minutes: parse_or(
                "CRITICAL_COUNTDOWN_MINUTES",
                defaults.critical_countdown_minutes,
            )?,
            shake_reset_ms: parse_or("SHAKE_RESET_MS", defaults.shake_reset_ms)?,
            remember_me: parse_or("REMEMBER_ME", defaults.remember_me)?,
            login_email: env_var("FOODSHARE_EMAIL").ok(),
            login_password: env_var("FOODSHARE_PASSWORD").ok(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shake_reset(&self) -> Duration {
        Duration::from_millis(self.shake_reset_ms)
    }

    pub fn critical_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.critical_countdown_minutes)
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ClientError::Config(format!("Missing env var: {key}")))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ClientError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}
