//! Connection to the NATS server the gateway forwards deliveries to.

use std::path::PathBuf;
use std::time::Duration;

use async_nats::{Client, ConnectOptions, Event};
use tracing::{info, instrument, warn};
use trogon_std::env::{ReadEnv, read_list};

const DEFAULT_NATS_URL: &str = "localhost:4222";
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// How the gateway authenticates to NATS.
///
/// Resolved from the environment in priority order: `NATS_CREDS`,
/// `NATS_NKEY`, `NATS_USER` + `NATS_PASSWORD`, `NATS_TOKEN`, none.
#[derive(Debug, Clone, PartialEq)]
pub enum NatsAuth {
    Credentials(PathBuf),
    NKey(String),
    UserPassword { user: String, password: String },
    Token(String),
    None,
}

impl NatsAuth {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials file",
            Self::NKey(_) => "NKey",
            Self::UserPassword { .. } => "user/password",
            Self::Token(_) => "token",
            Self::None => "none",
        }
    }

    fn from_env<E: ReadEnv>(env: &E) -> Self {
        if let Ok(path) = env.var("NATS_CREDS") {
            return Self::Credentials(PathBuf::from(path));
        }
        if let Ok(seed) = env.var("NATS_NKEY") {
            return Self::NKey(seed);
        }
        if let (Ok(user), Ok(password)) = (env.var("NATS_USER"), env.var("NATS_PASSWORD")) {
            return Self::UserPassword { user, password };
        }
        if let Ok(token) = env.var("NATS_TOKEN") {
            return Self::Token(token);
        }
        Self::None
    }
}

/// The outbound target: one or more NATS servers plus credentials.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub servers: Vec<String>,
    pub auth: NatsAuth,
}

impl NatsConfig {
    /// `NATS_URL` is a comma-separated server list (default `localhost:4222`).
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let mut servers = read_list(env, "NATS_URL");
        if servers.is_empty() {
            servers.push(DEFAULT_NATS_URL.to_string());
        }
        Self {
            servers,
            auth: NatsAuth::from_env(env),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("failed to load credentials file: {0}")]
    InvalidCredentials(#[source] std::io::Error),

    #[error("failed to connect to NATS servers {servers:?}: {source}")]
    ConnectionFailed {
        servers: Vec<String>,
        #[source]
        source: async_nats::ConnectError,
    },
}

fn reconnect_delay(attempts: usize) -> Duration {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX);
    Duration::from_secs(2u64.saturating_pow(exp)).min(MAX_RECONNECT_DELAY)
}

async fn log_event(event: Event) {
    match event {
        Event::Connected => info!("NATS connected"),
        Event::Disconnected => warn!("NATS disconnected, will attempt reconnect"),
        Event::ServerError(err) => warn!(error = %err, "NATS server error"),
        Event::ClientError(err) => warn!(error = %err, "NATS client error"),
        other => info!(event = %other, "NATS connection event"),
    }
}

/// Connects with retry on initial connect and capped exponential reconnects.
#[instrument(name = "nats.connect", skip_all, fields(servers = ?config.servers, auth = config.auth.description()))]
pub async fn connect(config: &NatsConfig, timeout: Duration) -> Result<Client, ConnectError> {
    let options = match &config.auth {
        NatsAuth::Credentials(path) => ConnectOptions::with_credentials_file(path.clone())
            .await
            .map_err(ConnectError::InvalidCredentials)?,
        NatsAuth::NKey(seed) => ConnectOptions::with_nkey(seed.clone()),
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };

    let client = options
        .retry_on_initial_connect()
        .connection_timeout(timeout)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { log_event(event).await })
        .connect(&config.servers)
        .await
        .map_err(|source| {
            warn!(error = %source, "Failed to connect to NATS");
            ConnectError::ConnectionFailed {
                servers: config.servers.clone(),
                source,
            }
        })?;

    info!("Connected to NATS");
    Ok(client)
}
