//! # trogon-webhook-gateway
//!
//! Admission and normalization gateway for GitHub webhooks. Verified,
//! admitted deliveries are republished to NATS JetStream as CloudEvents.
//!
//! ## How it works
//!
//! 1. GitHub sends `POST /` with `X-Hub-Signature-256`, `X-GitHub-Event`,
//!    `X-GitHub-Hook-ID`, `X-GitHub-Delivery` and `User-Agent` headers plus a
//!    JSON payload.
//! 2. The HMAC-SHA256 signature must match one of the configured secrets,
//!    otherwise `403`. A missing event header is a `400`.
//! 3. The payload is read into a permissive [`PayloadInfo`]; a body that does
//!    not parse is forwarded with empty metadata.
//! 4. The hook-id, organization and requested-only filters run. A rejected
//!    delivery is acknowledged with `202` and dropped.
//! 5. Pull request and issue references are derived, the delivery is wrapped
//!    in an [`EventEnvelope`] and published with up to 3 retries. `200` once
//!    JetStream acknowledges it, `500` when every attempt failed.
//!
//! ## NATS message format
//!
//! - **Subject**: `{GITHUB_SUBJECT_PREFIX}.{X-GitHub-Event}` (e.g. `github.pull_request`)
//! - **Headers**: `ce-specversion`, `ce-id` (delivery id), `ce-type`
//!   (`{GITHUB_EVENT_TYPE_PREFIX}.{event}`), `ce-source`, `ce-subject`
//!   (repository full name), `ce-time`, `ce-action`, `ce-githubhook` and,
//!   when derivable, `ce-pullrequest`, `ce-pullrequesturl`, `ce-issueurl`,
//!   `ce-merged`
//! - **Payload**: `{"when", "headers": {"hook_id", "delivery_id", "user_agent", "event"}, "body"}`
//!
//! ## Configuration (env vars)
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GITHUB_WEBHOOK_SECRETS` | — | Comma-separated HMAC-SHA256 secrets |
//! | `GITHUB_WEBHOOK_SECRET` | — | Single secret, added to the list |
//! | `GITHUB_WEBHOOK_PORT` | `8080` | HTTP listening port |
//! | `GITHUB_WEBHOOK_ID_ALLOWLIST` | — | Hook ids to forward |
//! | `GITHUB_ORG_ALLOWLIST` | — | Organization logins to forward |
//! | `GITHUB_REQUESTED_ONLY_WEBHOOK_IDS` | — | Hook ids forwarding only `requested` actions |
//! | `GITHUB_EVENT_TYPE_PREFIX` | `dev.trogon.github` | Namespace of `ce-type` |
//! | `GITHUB_SUBJECT_PREFIX` | `github` | NATS subject prefix |
//! | `GITHUB_STREAM_NAME` | `GITHUB` | JetStream stream name |
//! | `GITHUB_STREAM_MAX_AGE_SECS` | `604800` | Max age of messages in JetStream |
//! | `GITHUB_DELIVERY_TIMEOUT_SECS` | `10` | Timeout of one publish attempt |
//! | `GITHUB_WEBHOOK_MAX_BODY_BYTES` | `26214400` | Largest accepted request body (25 MiB) |
//! | `GITHUB_HEADER_READ_TIMEOUT_SECS` | `10` | Time a client gets to send request headers |
//! | `NATS_URL` | `localhost:4222` | NATS server URL(s) |

pub mod admission;
pub mod config;
pub mod delivery;
pub mod envelope;
pub mod extensions;
#[cfg(any(test, feature = "test-support"))]
pub mod mocks;
pub mod nats;
pub mod payload;
pub mod server;
pub mod signal;
pub mod signature;

pub use config::{ConfigError, GatewayConfig, ServerOptions};
pub use delivery::{DeliveryError, EventPublisher, JetStreamPublisher, RetryPolicy};
pub use envelope::{EventEnvelope, OutboundEvent};
pub use nats::{NatsConfig, connect};
pub use payload::PayloadInfo;
pub use server::{AppState, GatewayError, router, serve};
