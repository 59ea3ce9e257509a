//! Outbound delivery of [`OutboundEvent`]s with bounded retry.
//!
//! The transport sits behind [`EventPublisher`]. [`RetryPolicy`] wraps any
//! publisher with per-attempt timeouts and exponential backoff, and
//! [`deliver_detached`] runs the whole retry loop on its own task so a client
//! hanging up does not abort a forward that is already under way.

use std::future::Future;
use std::time::Duration;

use async_nats::jetstream::{self, stream};
use chrono::SecondsFormat;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::envelope::{DATA_CONTENT_TYPE, OutboundEvent};

pub const SPEC_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("event was not acknowledged: {0}")]
    Nack(String),

    #[error("event could not be sent: {0}")]
    Undelivered(String),

    #[error("delivery attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<DeliveryError>,
    },
}

/// Sends one event to the bus. A returned `Ok` means the bus acknowledged it.
pub trait EventPublisher: Send + Sync + Clone + 'static {
    fn publish(
        &self,
        event: &OutboundEvent,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Set to 0 to disable retries.
    pub max_retries: u32,
    /// Exponential backoff: delay * 2^retry_number.
    pub initial_retry_delay: Duration,
    /// Upper bound for a single publish including its acknowledgement.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.initial_retry_delay * (1u32 << exp)
    }

    /// Publishes `event`, retrying NACKs, send failures and timeouts alike.
    pub async fn execute<P: EventPublisher>(
        &self,
        publisher: &P,
        event: &OutboundEvent,
    ) -> Result<(), DeliveryError> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = tokio::time::timeout(self.attempt_timeout, publisher.publish(event))
                .await
                .unwrap_or(Err(DeliveryError::Timeout(self.attempt_timeout)));

            let error = match result {
                Ok(()) => {
                    if attempts > 1 {
                        info!(id = %event.id, attempts, "Event delivered after retries");
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            if attempts > self.max_retries {
                warn!(id = %event.id, error = %error, attempts, "Event delivery failed");
                return Err(if self.max_retries > 0 {
                    DeliveryError::Exhausted {
                        attempts,
                        last: Box::new(error),
                    }
                } else {
                    error
                });
            }

            let delay = self.backoff(attempts);
            debug!(
                id = %event.id,
                error = %error,
                attempt = attempts,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis(),
                "Event delivery failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Runs the retrying delivery on a separate task and waits for it.
///
/// Dropping the returned future leaves the spawned task running to
/// completion.
pub async fn deliver_detached<P: EventPublisher>(
    publisher: P,
    event: OutboundEvent,
    policy: RetryPolicy,
) -> Result<Result<(), DeliveryError>, JoinError> {
    tokio::spawn(async move { policy.execute(&publisher, &event).await }).await
}

/// Publishes events to JetStream as CloudEvents in binary content mode:
/// attributes travel as `ce-` headers, the envelope is the message payload.
#[derive(Clone)]
pub struct JetStreamPublisher {
    js: jetstream::Context,
    subject_prefix: String,
}

impl JetStreamPublisher {
    pub fn new(js: jetstream::Context, subject_prefix: impl Into<String>) -> Self {
        Self {
            js,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn subject_for(&self, event: &OutboundEvent) -> String {
        format!("{}.{}", self.subject_prefix, event.github_event)
    }
}

pub fn cloudevent_headers(event: &OutboundEvent) -> async_nats::HeaderMap {
    let mut headers = async_nats::HeaderMap::new();
    headers.insert("ce-specversion", SPEC_VERSION);
    headers.insert("ce-id", event.id.as_str());
    headers.insert("ce-type", event.event_type.as_str());
    headers.insert("ce-source", event.source.as_str());
    if !event.subject.is_empty() {
        headers.insert("ce-subject", event.subject.as_str());
    }
    headers.insert(
        "ce-time",
        event
            .time
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
            .as_str(),
    );
    for (name, value) in &event.extensions {
        headers.insert(format!("ce-{name}").as_str(), value.to_string().as_str());
    }
    headers.insert("Content-Type", DATA_CONTENT_TYPE);
    headers
}

impl EventPublisher for JetStreamPublisher {
    async fn publish(&self, event: &OutboundEvent) -> Result<(), DeliveryError> {
        let ack = self
            .js
            .publish_with_headers(
                self.subject_for(event),
                cloudevent_headers(event),
                event.data.clone(),
            )
            .await
            .map_err(|e| DeliveryError::Undelivered(e.to_string()))?;

        ack.await.map_err(|e| DeliveryError::Nack(e.to_string()))?;
        Ok(())
    }
}

/// Creates the stream capturing `{subject_prefix}.>` unless it exists.
pub async fn ensure_stream(
    js: &jetstream::Context,
    stream_name: &str,
    subject_prefix: &str,
    max_age: Duration,
) -> Result<(), jetstream::context::CreateStreamError> {
    js.get_or_create_stream(stream::Config {
        name: stream_name.to_string(),
        subjects: vec![format!("{subject_prefix}.>")],
        max_age,
        ..Default::default()
    })
    .await?;

    info!(stream = stream_name, "JetStream stream ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::Extensions;
    use crate::mocks::MockEventPublisher;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    fn event() -> OutboundEvent {
        let mut extensions = Extensions::new();
        extensions.insert("action".into(), "closed".into());
        extensions.insert("githubhook".into(), "1234".into());
        extensions.insert("merged".into(), true.into());

        OutboundEvent {
            id: "5678".into(),
            event_type: "dev.trogon.github.pull_request".into(),
            source: "hooks.example.com".into(),
            subject: "foo/bar".into(),
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            github_event: "pull_request".into(),
            extensions,
            data: Bytes::from_static(b"{}"),
        }
    }

    #[derive(Clone)]
    struct NeverAcks;

    impl EventPublisher for NeverAcks {
        async fn publish(&self, _event: &OutboundEvent) -> Result<(), DeliveryError> {
            std::future::pending().await
        }
    }

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let policy = RetryPolicy::standard();
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_time() {
        let publisher = MockEventPublisher::new();

        RetryPolicy::standard()
            .execute(&publisher, &event())
            .await
            .unwrap();

        assert_eq!(publisher.attempts(), 1);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let publisher = MockEventPublisher::new();
        publisher.fail_publish_count(3);

        RetryPolicy::standard()
            .execute(&publisher, &event())
            .await
            .unwrap();

        assert_eq!(publisher.attempts(), 4);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries() {
        let publisher = MockEventPublisher::new();
        publisher.fail_publish_count(4);

        let err = RetryPolicy::standard()
            .execute(&publisher, &event())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeliveryError::Exhausted { attempts: 4, ref last } if matches!(**last, DeliveryError::Nack(_))
        ));
        assert_eq!(publisher.attempts(), 4);
        assert!(publisher.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_retries_returns_the_error_itself() {
        let publisher = MockEventPublisher::new();
        publisher.fail_next_publish();

        let err = RetryPolicy::no_retries()
            .execute(&publisher, &event())
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Nack(_)));
        assert_eq!(publisher.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_timeout_counts_as_failure() {
        let policy = RetryPolicy::no_retries().with_attempt_timeout(Duration::from_secs(1));

        let err = policy.execute(&NeverAcks, &event()).await.unwrap_err();

        assert!(matches!(err, DeliveryError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_delivery_survives_caller_cancellation() {
        let publisher = MockEventPublisher::new();
        publisher.fail_publish_count(2);

        let fut = deliver_detached(publisher.clone(), event(), RetryPolicy::standard());
        let cancelled = tokio::time::timeout(Duration::from_millis(1), fut).await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(publisher.published().len(), 1);
        assert_eq!(publisher.attempts(), 3);
    }

    #[test]
    fn cloudevent_headers_carry_attributes_and_extensions() {
        let headers = cloudevent_headers(&event());
        let get = |name: &str| headers.get(name).map(|v| v.as_str().to_string());

        assert_eq!(get("ce-specversion").as_deref(), Some("1.0"));
        assert_eq!(get("ce-id").as_deref(), Some("5678"));
        assert_eq!(
            get("ce-type").as_deref(),
            Some("dev.trogon.github.pull_request")
        );
        assert_eq!(get("ce-source").as_deref(), Some("hooks.example.com"));
        assert_eq!(get("ce-subject").as_deref(), Some("foo/bar"));
        assert_eq!(get("ce-time").as_deref(), Some("2024-05-01T12:00:00Z"));
        assert_eq!(get("ce-action").as_deref(), Some("closed"));
        assert_eq!(get("ce-githubhook").as_deref(), Some("1234"));
        assert_eq!(get("ce-merged").as_deref(), Some("true"));
        assert_eq!(get("Content-Type").as_deref(), Some("application/json"));
    }

    #[test]
    fn empty_subject_is_omitted() {
        let mut event = event();
        event.subject.clear();

        assert!(cloudevent_headers(&event).get("ce-subject").is_none());
    }
}
