//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::DEFAULT_PAYMENT_TIMEOUT;
use projections::MailerConfig;
use secrecy::SecretString;

/// How log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// PayPal credentials. Without them checkouts use the in-memory widget.
#[derive(Debug, Clone)]
pub struct PayPalSettings {
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_base: Option<String>,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL event store; in-memory when unset
/// - `PAYMENT_TIMEOUT_SECS`: payment round trip deadline (default: `120`)
/// - `OFFER_NOTIFICATION_URL`, `SALE_NOTIFICATION_URL`,
///   `FEEDBACK_NOTIFICATION_URL`: mail endpoints
/// - `FEEDBACK_RECIPIENTS`: comma separated feedback addresses
/// - `PAYPAL_CLIENT_ID`, `PAYPAL_CLIENT_SECRET`, `PAYPAL_API_BASE`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub payment_timeout: Duration,
    pub mailer: MailerConfig,
    pub feedback_recipients: Vec<String>,
    pub paypal: Option<PayPalSettings>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let paypal = match (var("PAYPAL_CLIENT_ID"), var("PAYPAL_CLIENT_SECRET")) {
            (Some(client_id), Some(secret)) => Some(PayPalSettings {
                client_id,
                client_secret: SecretString::from(secret),
                api_base: var("PAYPAL_API_BASE"),
            }),
            _ => None,
        };

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            database_url: var("DATABASE_URL"),
            payment_timeout: var("PAYMENT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.payment_timeout),
            mailer: MailerConfig {
                offer_url: var("OFFER_NOTIFICATION_URL"),
                sale_url: var("SALE_NOTIFICATION_URL"),
                feedback_url: var("FEEDBACK_NOTIFICATION_URL"),
            },
            feedback_recipients: var("FEEDBACK_RECIPIENTS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            paypal,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
            mailer: MailerConfig::default(),
            feedback_recipients: Vec::new(),
            paypal: None,
        }
    }
}
