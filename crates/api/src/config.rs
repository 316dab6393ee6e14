use std::str::FromStr;
use std::time::Duration;

use hookcast_core::webhooks::MAX_DELIVERY_ATTEMPTS;
use hookcast_events::{DeliveryConfig, RetryPolicy};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Subscription store location; `postgres://` or `sqlite:` URL.
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Outbound webhook delivery settings.
    pub webhook: WebhookSettings,
}

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Per-attempt HTTP timeout in seconds (default: `10`).
    pub timeout_secs: u64,
    /// Attempts per subscriber per event (default: `5`).
    pub max_attempts: u32,
    /// Skip TLS certificate verification on subscriber endpoints.
    pub insecure_skip_verify: bool,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 5,
            insecure_skip_verify: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                  |
    /// |--------------------------------|--------------------------|
    /// | `HOST`                         | `0.0.0.0`                |
    /// | `PORT`                         | `3000`                   |
    /// | `DATABASE_URL`                 | `sqlite:webhooks.db`     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                     |
    /// | `WEBHOOK_TIMEOUT_SECS`         | `10`                     |
    /// | `WEBHOOK_MAX_ATTEMPTS`         | `5` (also the maximum)   |
    /// | `WEBHOOK_INSECURE_SKIP_VERIFY` | `false`                  |
    ///
    /// Panics on unparsable values: misconfiguration should fail at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_env("PORT", 3000);
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:webhooks.db".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 30);

        let defaults = WebhookSettings::default();
        let webhook = WebhookSettings {
            timeout_secs: parse_env("WEBHOOK_TIMEOUT_SECS", defaults.timeout_secs),
            max_attempts: parse_env("WEBHOOK_MAX_ATTEMPTS", defaults.max_attempts),
            insecure_skip_verify: parse_env(
                "WEBHOOK_INSECURE_SKIP_VERIFY",
                defaults.insecure_skip_verify,
            ),
        };

        Self {
            host,
            port,
            database_url,
            cors_origins,
            request_timeout_secs,
            webhook,
        }
    }

    /// Delivery engine settings derived from [`WebhookSettings`].
    ///
    /// Attempts are clamped to `1..=MAX_DELIVERY_ATTEMPTS`.
    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            request_timeout: Duration::from_secs(self.webhook.timeout_secs),
            insecure_skip_verify: self.webhook.insecure_skip_verify,
            retry: RetryPolicy {
                max_attempts: self.webhook.max_attempts.clamp(1, MAX_DELIVERY_ATTEMPTS),
                ..RetryPolicy::default()
            },
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_attempts(max_attempts: u32) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
            cors_origins: vec![],
            request_timeout_secs: 30,
            webhook: WebhookSettings {
                max_attempts,
                ..WebhookSettings::default()
            },
        }
    }

    #[test]
    fn delivery_config_uses_webhook_settings() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
            cors_origins: vec![],
            request_timeout_secs: 30,
            webhook: WebhookSettings {
                timeout_secs: 3,
                max_attempts: 0,
                insecure_skip_verify: true,
            },
        };
        let delivery = config.delivery_config();
        assert_eq!(delivery.request_timeout, Duration::from_secs(3));
        assert_eq!(delivery.retry.max_attempts, 1);
        assert!(delivery.insecure_skip_verify);
    }

    #[test]
    fn delivery_config_caps_attempts() {
        let delivery = config_with_attempts(9).delivery_config();
        assert_eq!(delivery.retry.max_attempts, MAX_DELIVERY_ATTEMPTS);

        let delivery = config_with_attempts(3).delivery_config();
        assert_eq!(delivery.retry.max_attempts, 3);
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        let value: u64 = parse_env("HOOKCAST_TEST_UNSET_VARIABLE", 42);
        assert_eq!(value, 42);
    }
}
