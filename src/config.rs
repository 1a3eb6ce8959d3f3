use std::time::Duration;

use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,

    // Booking core tunables
    pub hold_ttl_seconds: u64,
    pub expiry_tick_seconds: u64,
    pub reconcile_tick_seconds: u64,
    pub booking_retry_attempts: u32,
    pub booking_initial_backoff_ms: u64,
    pub request_timeout_seconds: u64,

    // Auth
    pub jwt_secret: Secret<String>,

    // Mailer; absent SMTP config downgrades notifications to log lines
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub from: String,
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOLD_TTL_SECONDS: u64 = 300;
const DEFAULT_EXPIRY_TICK_SECONDS: u64 = 30;
const DEFAULT_RECONCILE_TICK_SECONDS: u64 = 3600;
const DEFAULT_BOOKING_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_BOOKING_INITIAL_BACKOFF_MS: u64 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_SMTP_PORT: u16 = 587;

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let smtp = match config.get::<String>("smtp_host") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: config.get("smtp_port").unwrap_or(DEFAULT_SMTP_PORT),
                username: config.get("smtp_username")?,
                password: Secret::new(config.get("smtp_password")?),
                from: config.get("smtp_from")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url: config.get("database_url")?,
            port: config.get("port").unwrap_or(DEFAULT_PORT),

            hold_ttl_seconds: config
                .get("hold_ttl_seconds")
                .unwrap_or(DEFAULT_HOLD_TTL_SECONDS),
            expiry_tick_seconds: config
                .get("expiry_tick_seconds")
                .unwrap_or(DEFAULT_EXPIRY_TICK_SECONDS),
            reconcile_tick_seconds: config
                .get("reconcile_tick_seconds")
                .unwrap_or(DEFAULT_RECONCILE_TICK_SECONDS),
            booking_retry_attempts: config
                .get("booking_retry_attempts")
                .unwrap_or(DEFAULT_BOOKING_RETRY_ATTEMPTS),
            booking_initial_backoff_ms: config
                .get("booking_initial_backoff_ms")
                .unwrap_or(DEFAULT_BOOKING_INITIAL_BACKOFF_MS),
            request_timeout_seconds: config
                .get("request_timeout_seconds")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),

            jwt_secret: Secret::new(config.get("jwt_secret")?),

            smtp,
        })
    }

    pub fn hold_ttl(&self) -> Duration {
        Duration::from_secs(self.hold_ttl_seconds)
    }

    pub fn expiry_tick(&self) -> Duration {
        Duration::from_secs(self.expiry_tick_seconds)
    }

    pub fn reconcile_tick(&self) -> Duration {
        Duration::from_secs(self.reconcile_tick_seconds)
    }

    pub fn booking_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.booking_initial_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
