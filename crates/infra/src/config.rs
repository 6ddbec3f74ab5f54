//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::NaiveTime;
use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

const DEV_JWT_SECRET: &str = "stockflow-dev-secret-change-me";

/// Longest accepted alert cooldown: ten years.
pub const MAX_NOTIFY_WINDOW_HOURS: i64 = 24 * 365 * 10;

/// Mail transport and addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub to: Vec<String>,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// `None` disables the token-authenticated trigger.
    pub notify_token: Option<String>,
    pub upload_dir: PathBuf,
    pub mail: MailSettings,
    /// Local wall-clock time of the daily stock check.
    pub notify_at: NaiveTime,
    /// Zone `notify_at` and the alert timestamps are expressed in.
    pub notify_timezone: Tz,
    pub notify_window_hours: i64,
}

impl Settings {
    /// Load configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BIND_ADDR` | `0.0.0.0:8080` |
    /// | `DATABASE_URL` | (unset: in-memory store) |
    /// | `JWT_SECRET` | development secret, with a warning |
    /// | `NOTIFY_TOKEN` | (unset: token trigger disabled) |
    /// | `UPLOAD_DIR` | `uploads` |
    /// | `SMTP_HOST` / `SMTP_PORT` | `localhost` / `25` |
    /// | `SMTP_USERNAME` / `SMTP_PASSWORD` | (unset) |
    /// | `FROM_EMAIL` / `FROM_NAME` | `stock@localhost` / `Gestion Stock` |
    /// | `TO_EMAIL` | comma-separated, defaults to `FROM_EMAIL` |
    /// | `NOTIFY_AT` | `09:00` |
    /// | `NOTIFY_TIMEZONE` | `Europe/Paris` (IANA name) |
    /// | `NOTIFY_WINDOW_HOURS` | `72`, at most ten years |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("BIND_ADDR"))?;

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let smtp_port = match var("SMTP_PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid("SMTP_PORT"))?,
            None => 25,
        };

        let from_email = var("FROM_EMAIL").unwrap_or_else(|| "stock@localhost".to_string());
        let to = var("TO_EMAIL")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|| vec![from_email.clone()]);

        let notify_at = match var("NOTIFY_AT") {
            Some(t) => NaiveTime::parse_from_str(&t, "%H:%M")
                .map_err(|_| ConfigError::Invalid("NOTIFY_AT"))?,
            None => NaiveTime::from_hms_opt(9, 0, 0).ok_or(ConfigError::Invalid("NOTIFY_AT"))?,
        };

        let notify_timezone = match var("NOTIFY_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::Invalid("NOTIFY_TIMEZONE"))?,
            None => chrono_tz::Europe::Paris,
        };

        let notify_window_hours = match var("NOTIFY_WINDOW_HOURS") {
            Some(h) => h
                .parse::<i64>()
                .ok()
                .filter(|h| (1..=MAX_NOTIFY_WINDOW_HOURS).contains(h))
                .ok_or(ConfigError::Invalid("NOTIFY_WINDOW_HOURS"))?,
            None => 72,
        };

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            jwt_secret,
            notify_token: var("NOTIFY_TOKEN"),
            upload_dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            mail: MailSettings {
                smtp_host: var("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
                smtp_port,
                smtp_username: var("SMTP_USERNAME"),
                smtp_password: var("SMTP_PASSWORD"),
                from_email,
                from_name: var("FROM_NAME").unwrap_or_else(|| "Gestion Stock".to_string()),
                to,
            },
            notify_at,
            notify_timezone,
            notify_window_hours,
        })
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    Invalid(&'static str),
}
