use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{HOST, USER_AGENT};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};
use trogon_std::time::{GetNow, SystemClock};

use crate::admission::{Admission, admit};
use crate::config::{DEFAULT_MAX_BODY_BYTES, GatewayConfig, ServerOptions};
use crate::delivery::{
    DeliveryError, EventPublisher, JetStreamPublisher, RetryPolicy, deliver_detached, ensure_stream,
};
use crate::envelope::{EnvelopeHeaders, EventEnvelope, OutboundEvent};
use crate::extensions::Derived;
use crate::payload::PayloadInfo;
use crate::signal::shutdown_signal;
use crate::signature::{self, SIGNATURE_HEADER};

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";
pub const HOOK_ID_HEADER: &str = "x-github-hook-id";

/// Terminal outcomes of a delivery that GitHub should see as a failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("signature verification failed")]
    InvalidSignature,

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("failed to encode event envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("failed to deliver event: {0}")]
    Undelivered(#[source] DeliveryError),

    #[error("delivery task failed")]
    DeliveryTaskFailed,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::MissingHeader(_) => StatusCode::BAD_REQUEST,
            Self::Envelope(_) | Self::Undelivered(_) | Self::DeliveryTaskFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Successful outcomes; both tell GitHub not to redeliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Filtered,
}

impl IntoResponse for Disposition {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Delivered => StatusCode::OK,
            Self::Filtered => StatusCode::ACCEPTED,
        };
        status.into_response()
    }
}

/// Shared per-instance state. Nothing in here is mutated by requests.
#[derive(Clone)]
pub struct AppState<P, C> {
    options: Arc<ServerOptions>,
    publisher: P,
    clock: C,
    event_type_prefix: Arc<str>,
    retry: RetryPolicy,
    max_body_bytes: usize,
}

impl<P, C> AppState<P, C> {
    pub fn new(options: ServerOptions, publisher: P, clock: C, event_type_prefix: &str) -> Self {
        Self {
            options: Arc::new(options),
            publisher,
            clock,
            event_type_prefix: event_type_prefix.into(),
            retry: RetryPolicy::standard(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

/// `POST /` receives deliveries, `GET /healthz` is a liveness probe.
///
/// Bodies up to the state's `max_body_bytes` are accepted; larger ones get
/// `413` before any verification.
pub fn router<P, C>(state: AppState<P, C>) -> Router
where
    P: EventPublisher,
    C: GetNow<Instant = DateTime<Utc>> + Clone + Send + Sync + 'static,
{
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route("/", post(handle_webhook::<P, C>))
        .route("/healthz", get(healthz))
        .layer(body_limit)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Starts the webhook gateway.
///
/// Ensures the JetStream stream exists (capturing `{prefix}.>`), then serves
/// until SIGINT or SIGTERM.
pub async fn serve(
    config: GatewayConfig,
    nats: async_nats::Client,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let js = jetstream::new(nats);

    ensure_stream(
        &js,
        &config.stream_name,
        &config.subject_prefix,
        config.stream_max_age,
    )
    .await?;

    let state = AppState::new(
        config.server_options(),
        JetStreamPublisher::new(js, config.subject_prefix.as_str()),
        SystemClock,
        &config.event_type_prefix,
    )
    .with_retry_policy(RetryPolicy::standard().with_attempt_timeout(config.delivery_timeout))
    .with_max_body_bytes(config.max_body_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Webhook gateway listening");

    run(
        listener,
        router(state),
        config.header_read_timeout,
        shutdown_signal(),
    )
    .await;

    Ok(())
}

/// Accepts HTTP/1.1 connections until `shutdown` resolves, then waits for
/// in-flight connections to finish.
///
/// A client that has not sent complete request headers within
/// `header_read_timeout` is disconnected.
pub async fn run<F>(listener: TcpListener, app: Router, header_read_timeout: Duration, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    let service = TowerToHyperService::new(app);
    let graceful = GracefulShutdown::new();
    let mut shutdown = std::pin::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(error) => {
                    warn!(error = %error, "Failed to accept connection");
                    continue;
                }
            },
            () = &mut shutdown => break,
        };

        let conn = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(header_read_timeout)
            .serve_connection(TokioIo::new(stream), service.clone());
        let conn = graceful.watch(conn);

        tokio::spawn(async move {
            if let Err(error) = conn.await {
                debug!(peer = %peer, error = %error, "Connection closed with error");
            }
        });
    }

    graceful.shutdown().await;
    info!("Webhook gateway stopped");
}

fn header<'a>(headers: &'a HeaderMap, name: impl axum::http::header::AsHeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// The host the delivery was addressed to, which becomes the event source.
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> &'a str {
    match header(headers, HOST) {
        "" => uri.host().unwrap_or_default(),
        host => host,
    }
}

#[instrument(
    name = "github.webhook",
    skip_all,
    fields(
        event = tracing::field::Empty,
        delivery = tracing::field::Empty,
        hook = tracing::field::Empty,
        action = tracing::field::Empty,
        repo = tracing::field::Empty,
    )
)]
async fn handle_webhook<P, C>(
    State(state): State<AppState<P, C>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Disposition, GatewayError>
where
    P: EventPublisher,
    C: GetNow<Instant = DateTime<Utc>> + Clone + Send + Sync + 'static,
{
    if !signature::verify(&state.options.secrets, &body, header(&headers, SIGNATURE_HEADER)) {
        warn!("Rejected delivery with invalid or missing signature");
        return Err(GatewayError::InvalidSignature);
    }

    let event = header(&headers, EVENT_HEADER);
    if event.is_empty() {
        warn!("Missing X-GitHub-Event header");
        return Err(GatewayError::MissingHeader("X-GitHub-Event"));
    }

    let envelope_headers = EnvelopeHeaders {
        hook_id: header(&headers, HOOK_ID_HEADER).to_string(),
        delivery_id: header(&headers, DELIVERY_HEADER).to_string(),
        user_agent: header(&headers, USER_AGENT).to_string(),
        event: event.to_string(),
    };

    let span = tracing::Span::current();
    span.record("event", event);
    span.record("delivery", envelope_headers.delivery_id.as_str());
    span.record("hook", envelope_headers.hook_id.as_str());

    let payload = PayloadInfo::parse(&body).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to parse payload; forwarding without derived metadata");
        PayloadInfo::default()
    });
    span.record("action", payload.action.as_str());
    span.record("repo", payload.repository.full_name.as_str());

    if let Admission::Reject(reason) = admit(&envelope_headers.hook_id, &payload, &state.options)
    {
        info!(reason = reason.as_str(), "Delivery filtered");
        return Ok(Disposition::Filtered);
    }

    let derived = Derived::from_payload(event, &payload);
    let envelope = EventEnvelope::new(state.clock.now(), envelope_headers, body);
    let outbound = OutboundEvent::build(
        &state.event_type_prefix,
        request_host(&headers, &uri),
        &payload,
        derived,
        &envelope,
    )
    .map_err(|e| {
        warn!(error = %e, "Failed to encode event envelope");
        GatewayError::Envelope(e)
    })?;

    match deliver_detached(state.publisher.clone(), outbound, state.retry).await {
        Ok(Ok(())) => {
            info!("Forwarded GitHub event");
            Ok(Disposition::Delivered)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to forward GitHub event");
            Err(GatewayError::Undelivered(e))
        }
        Err(e) => {
            warn!(error = %e, "Delivery task failed");
            Err(GatewayError::DeliveryTaskFailed)
        }
    }
}
