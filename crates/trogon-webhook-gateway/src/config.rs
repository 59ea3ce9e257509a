use std::collections::HashSet;
use std::time::Duration;

use trogon_std::env::{ReadEnv, read_list};

use crate::nats::NatsConfig;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_EVENT_TYPE_PREFIX: &str = "dev.trogon.github";
const DEFAULT_SUBJECT_PREFIX: &str = "github";
const DEFAULT_STREAM_NAME: &str = "GITHUB";
const DEFAULT_STREAM_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60; // 7 days
const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HEADER_READ_TIMEOUT_SECS: u64 = 10;
/// GitHub caps webhook payloads at 25 MB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Configuration for the webhook gateway.
///
/// Resolved from environment variables:
/// - `GITHUB_WEBHOOK_SECRETS`: comma-separated HMAC-SHA256 secrets, any of which may sign a delivery
/// - `GITHUB_WEBHOOK_SECRET`: a single secret, appended to the list above
/// - `GITHUB_WEBHOOK_PORT`: HTTP listening port (default: 8080)
/// - `GITHUB_WEBHOOK_ID_ALLOWLIST`: comma-separated hook ids to forward (default: all)
/// - `GITHUB_ORG_ALLOWLIST`: comma-separated organization logins to forward (default: all)
/// - `GITHUB_REQUESTED_ONLY_WEBHOOK_IDS`: hook ids that only forward `action == "requested"`
/// - `GITHUB_EVENT_TYPE_PREFIX`: namespace of the outbound event type (default: `dev.trogon.github`)
/// - `GITHUB_SUBJECT_PREFIX`: NATS subject prefix (default: `github`)
/// - `GITHUB_STREAM_NAME`: JetStream stream name (default: `GITHUB`)
/// - `GITHUB_STREAM_MAX_AGE_SECS`: max age of messages in the stream (default: 604800 / 7 days)
/// - `GITHUB_DELIVERY_TIMEOUT_SECS`: timeout of a single publish attempt (default: 10)
/// - `GITHUB_WEBHOOK_MAX_BODY_BYTES`: largest accepted request body (default: 25 MiB)
/// - `GITHUB_HEADER_READ_TIMEOUT_SECS`: time a client gets to send request headers (default: 10)
/// - Standard `NATS_*` variables for the NATS connection
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub webhook_secrets: Vec<String>,
    pub port: u16,
    pub webhook_ids: Vec<String>,
    pub org_filter: Vec<String>,
    pub requested_only_webhooks: Vec<String>,
    pub event_type_prefix: String,
    pub subject_prefix: String,
    pub stream_name: String,
    pub stream_max_age: Duration,
    pub delivery_timeout: Duration,
    pub max_body_bytes: usize,
    pub header_read_timeout: Duration,
    pub nats: NatsConfig,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("no webhook secret configured; set GITHUB_WEBHOOK_SECRETS or GITHUB_WEBHOOK_SECRET")]
    NoSecrets,
}

impl GatewayConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let mut webhook_secrets = read_list(env, "GITHUB_WEBHOOK_SECRETS");
        if let Ok(secret) = env.var("GITHUB_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                webhook_secrets.push(secret);
            }
        }

        Self {
            webhook_secrets,
            port: parse_or(env, "GITHUB_WEBHOOK_PORT", DEFAULT_PORT),
            webhook_ids: read_list(env, "GITHUB_WEBHOOK_ID_ALLOWLIST"),
            org_filter: read_list(env, "GITHUB_ORG_ALLOWLIST"),
            requested_only_webhooks: read_list(env, "GITHUB_REQUESTED_ONLY_WEBHOOK_IDS"),
            event_type_prefix: env
                .var("GITHUB_EVENT_TYPE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_EVENT_TYPE_PREFIX.to_string()),
            subject_prefix: env
                .var("GITHUB_SUBJECT_PREFIX")
                .unwrap_or_else(|_| DEFAULT_SUBJECT_PREFIX.to_string()),
            stream_name: env
                .var("GITHUB_STREAM_NAME")
                .unwrap_or_else(|_| DEFAULT_STREAM_NAME.to_string()),
            stream_max_age: Duration::from_secs(parse_or(
                env,
                "GITHUB_STREAM_MAX_AGE_SECS",
                DEFAULT_STREAM_MAX_AGE_SECS,
            )),
            delivery_timeout: Duration::from_secs(parse_or(
                env,
                "GITHUB_DELIVERY_TIMEOUT_SECS",
                DEFAULT_DELIVERY_TIMEOUT_SECS,
            )),
            max_body_bytes: parse_or(env, "GITHUB_WEBHOOK_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            header_read_timeout: Duration::from_secs(parse_or(
                env,
                "GITHUB_HEADER_READ_TIMEOUT_SECS",
                DEFAULT_HEADER_READ_TIMEOUT_SECS,
            )),
            nats: NatsConfig::from_env(env),
        }
    }

    /// Every delivery would be rejected without at least one secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_secrets.is_empty() {
            return Err(ConfigError::NoSecrets);
        }
        Ok(())
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            secrets: self
                .webhook_secrets
                .iter()
                .map(|s| s.as_bytes().to_vec())
                .collect(),
            webhook_ids: self.webhook_ids.iter().cloned().collect(),
            org_filter: self.org_filter.iter().cloned().collect(),
            requested_only_webhooks: self.requested_only_webhooks.iter().cloned().collect(),
        }
    }
}

fn parse_or<E: ReadEnv, T: std::str::FromStr>(env: &E, key: &str, default: T) -> T {
    env.var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-instance admission and authentication settings.
///
/// Built once at startup and shared read-only by every request. An empty
/// set means "no restriction of that kind".
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Ordered; a delivery is authentic if any of these signed it.
    pub secrets: Vec<Vec<u8>>,
    pub webhook_ids: HashSet<String>,
    pub org_filter: HashSet<String>,
    pub requested_only_webhooks: HashSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use trogon_std::env::InMemoryEnv;

    #[test]
    fn defaults_when_no_env_vars() {
        let config = GatewayConfig::from_env(&InMemoryEnv::new());

        assert!(config.webhook_secrets.is_empty());
        assert_eq!(config.port, 8080);
        assert!(config.webhook_ids.is_empty());
        assert!(config.org_filter.is_empty());
        assert!(config.requested_only_webhooks.is_empty());
        assert_eq!(config.event_type_prefix, "dev.trogon.github");
        assert_eq!(config.subject_prefix, "github");
        assert_eq!(config.stream_name, "GITHUB");
        assert_eq!(config.stream_max_age, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.delivery_timeout, Duration::from_secs(10));
        assert_eq!(config.max_body_bytes, 25 * 1024 * 1024);
        assert_eq!(config.header_read_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_all_env_vars() {
        let env = InMemoryEnv::new();
        env.set("GITHUB_WEBHOOK_SECRETS", "old-secret,new-secret");
        env.set("GITHUB_WEBHOOK_PORT", "9090");
        env.set("GITHUB_WEBHOOK_ID_ALLOWLIST", "1234, 5678");
        env.set("GITHUB_ORG_ALLOWLIST", "trogonstack");
        env.set("GITHUB_REQUESTED_ONLY_WEBHOOK_IDS", "1234");
        env.set("GITHUB_EVENT_TYPE_PREFIX", "com.example.github");
        env.set("GITHUB_SUBJECT_PREFIX", "gh");
        env.set("GITHUB_STREAM_NAME", "GH_EVENTS");
        env.set("GITHUB_STREAM_MAX_AGE_SECS", "3600");
        env.set("GITHUB_DELIVERY_TIMEOUT_SECS", "2");
        env.set("GITHUB_WEBHOOK_MAX_BODY_BYTES", "1048576");
        env.set("GITHUB_HEADER_READ_TIMEOUT_SECS", "3");

        let config = GatewayConfig::from_env(&env);

        assert_eq!(config.webhook_secrets, vec!["old-secret", "new-secret"]);
        assert_eq!(config.port, 9090);
        assert_eq!(config.webhook_ids, vec!["1234", "5678"]);
        assert_eq!(config.org_filter, vec!["trogonstack"]);
        assert_eq!(config.requested_only_webhooks, vec!["1234"]);
        assert_eq!(config.event_type_prefix, "com.example.github");
        assert_eq!(config.subject_prefix, "gh");
        assert_eq!(config.stream_name, "GH_EVENTS");
        assert_eq!(config.stream_max_age, Duration::from_secs(3600));
        assert_eq!(config.delivery_timeout, Duration::from_secs(2));
        assert_eq!(config.max_body_bytes, 1_048_576);
        assert_eq!(config.header_read_timeout, Duration::from_secs(3));
    }

    #[test]
    fn single_secret_is_appended_after_list() {
        let env = InMemoryEnv::new();
        env.set("GITHUB_WEBHOOK_SECRETS", "a,b");
        env.set("GITHUB_WEBHOOK_SECRET", "c");

        let config = GatewayConfig::from_env(&env);

        assert_eq!(config.webhook_secrets, vec!["a", "b", "c"]);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let env = InMemoryEnv::new();
        env.set("GITHUB_WEBHOOK_PORT", "not-a-number");
        env.set("GITHUB_STREAM_MAX_AGE_SECS", "-1");

        let config = GatewayConfig::from_env(&env);

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.stream_max_age,
            Duration::from_secs(DEFAULT_STREAM_MAX_AGE_SECS)
        );
    }

    #[test]
    fn validate_requires_a_secret() {
        let env = InMemoryEnv::new();
        assert_eq!(
            GatewayConfig::from_env(&env).validate(),
            Err(ConfigError::NoSecrets)
        );

        env.set("GITHUB_WEBHOOK_SECRET", "hunter2");
        assert_eq!(GatewayConfig::from_env(&env).validate(), Ok(()));
    }

    #[test]
    fn empty_single_secret_is_ignored() {
        let env = InMemoryEnv::new();
        env.set("GITHUB_WEBHOOK_SECRET", "");
        assert!(GatewayConfig::from_env(&env).webhook_secrets.is_empty());
    }

    #[test]
    fn server_options_mirror_config() {
        let env = InMemoryEnv::new();
        env.set("GITHUB_WEBHOOK_SECRETS", "s1,s2");
        env.set("GITHUB_ORG_ALLOWLIST", "org");

        let opts = GatewayConfig::from_env(&env).server_options();

        assert_eq!(opts.secrets, vec![b"s1".to_vec(), b"s2".to_vec()]);
        assert!(opts.org_filter.contains("org"));
        assert!(opts.webhook_ids.is_empty());
        assert!(opts.requested_only_webhooks.is_empty());
    }
}
