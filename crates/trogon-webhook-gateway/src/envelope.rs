//! Canonical representation of an accepted delivery and the bus message
//! that carries it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::extensions::{Derived, Extensions};
use crate::payload::PayloadInfo;

pub const DATA_CONTENT_TYPE: &str = "application/json";

/// The whitelisted subset of inbound request headers, copied verbatim.
/// Absent headers are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvelopeHeaders {
    pub hook_id: String,
    pub delivery_id: String,
    pub user_agent: String,
    pub event: String,
}

/// What downstream consumers receive as event data.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub when: DateTime<Utc>,
    pub headers: EnvelopeHeaders,
    #[serde(serialize_with = "raw_body")]
    pub body: Bytes,
}

/// Embeds the body as-is when it is JSON, otherwise as a JSON string, so a
/// malformed delivery can still be forwarded.
fn raw_body<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    let raw = std::str::from_utf8(body)
        .ok()
        .and_then(|s| serde_json::from_str::<&RawValue>(s).ok());
    match raw {
        Some(raw) => raw.serialize(serializer),
        None => serializer.serialize_str(&String::from_utf8_lossy(body)),
    }
}

impl EventEnvelope {
    pub fn new(when: DateTime<Utc>, headers: EnvelopeHeaders, body: Bytes) -> Self {
        Self {
            when,
            headers,
            body,
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// The message published to the bus, shaped after a CloudEvents 1.0 event.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    /// The delivery id, so consumers can deduplicate on it.
    pub id: String,
    /// `{prefix}.{github event}`.
    pub event_type: String,
    pub source: String,
    /// Repository full name, possibly empty.
    pub subject: String,
    pub time: DateTime<Utc>,
    /// The raw `X-GitHub-Event` value, used for subject routing.
    pub github_event: String,
    pub extensions: Extensions,
    /// Serialized [`EventEnvelope`].
    pub data: Bytes,
}

impl OutboundEvent {
    /// Assembles the bus message for an admitted delivery.
    ///
    /// `action` and `githubhook` are always set; the derived attributes only
    /// when present.
    pub fn build(
        type_prefix: &str,
        source: &str,
        payload: &PayloadInfo,
        derived: Derived,
        envelope: &EventEnvelope,
    ) -> Result<Self, serde_json::Error> {
        let data = envelope.to_vec()?;

        let mut extensions = Extensions::new();
        extensions.insert("action".into(), payload.action.as_str().into());
        extensions.insert("githubhook".into(), envelope.headers.hook_id.as_str().into());
        derived.apply(&mut extensions);

        Ok(Self {
            id: envelope.headers.delivery_id.clone(),
            event_type: format!("{type_prefix}.{}", envelope.headers.event),
            source: source.to_string(),
            subject: payload.repository.full_name.clone(),
            time: envelope.when,
            github_event: envelope.headers.event.clone(),
            extensions,
            data: data.into(),
        })
    }
}
