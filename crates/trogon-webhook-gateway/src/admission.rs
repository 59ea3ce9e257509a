//! Policy deciding whether a verified delivery is forwarded.
//!
//! Each criterion is off while its list is empty. A delivery must pass every
//! configured criterion. A rejection is not an error: the caller
//! acknowledges the delivery so GitHub does not redeliver it.

use crate::config::ServerOptions;
use crate::payload::PayloadInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    HookNotAllowed,
    OrganizationNotAllowed,
    NotRequested,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HookNotAllowed => "hook id not in allow-list",
            Self::OrganizationNotAllowed => "organization not in allow-list",
            Self::NotRequested => "requested-only hook with non-requested action",
        }
    }
}

pub fn admit(hook_id: &str, payload: &PayloadInfo, options: &ServerOptions) -> Admission {
    if !options.webhook_ids.is_empty() && !options.webhook_ids.contains(hook_id) {
        return Admission::Reject(RejectReason::HookNotAllowed);
    }

    if !options.org_filter.is_empty() && !options.org_filter.contains(&payload.organization.login)
    {
        return Admission::Reject(RejectReason::OrganizationNotAllowed);
    }

    if options.requested_only_webhooks.contains(hook_id) && payload.action != "requested" {
        return Admission::Reject(RejectReason::NotRequested);
    }

    Admission::Accept
}
