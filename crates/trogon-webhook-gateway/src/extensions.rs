//! Event-type specific metadata derived from a [`PayloadInfo`].
//!
//! Every rule is independent and returns `None` when any input it needs is
//! missing. A derived value never contains a placeholder segment.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::payload::PayloadInfo;

const GITHUB_WEB: &str = "https://github.com";

/// A CloudEvents extension attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    String(String),
    Bool(bool),
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Extension name to value, ordered so headers come out deterministically.
pub type Extensions = BTreeMap<String, ExtensionValue>;

/// Values derived from one delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Derived {
    pub pull_request: Option<String>,
    pub pull_request_url: Option<String>,
    pub issue_url: Option<String>,
    pub merged: bool,
}

impl Derived {
    pub fn from_payload(event_type: &str, payload: &PayloadInfo) -> Self {
        Self {
            pull_request: pull_request_ref(event_type, payload),
            pull_request_url: pull_request_url(event_type, payload),
            issue_url: issue_url(event_type, payload),
            merged: is_pull_request_merged(event_type, payload),
        }
    }

    /// Adds the derived attributes that are present to `extensions`.
    pub fn apply(self, extensions: &mut Extensions) {
        if let Some(pr) = self.pull_request {
            extensions.insert("pullrequest".into(), pr.into());
        }
        if let Some(url) = self.pull_request_url {
            extensions.insert("pullrequesturl".into(), url.into());
        }
        if let Some(url) = self.issue_url {
            extensions.insert("issueurl".into(), url.into());
        }
        if self.merged {
            extensions.insert("merged".into(), true.into());
        }
    }
}

/// `owner/name#number` for `pull_request` events.
pub fn pull_request_ref(event_type: &str, payload: &PayloadInfo) -> Option<String> {
    if event_type != "pull_request" || payload.pull_request.number == 0 {
        return None;
    }
    let (owner, name) = payload.repository.owner_and_name()?;
    Some(format!("{owner}/{name}#{}", payload.pull_request.number))
}

/// Web URL of the pull request a delivery is about.
///
/// `issue_comment` deliveries on a pull request use the issue number, since
/// GitHub numbers issues and pull requests from the same sequence.
pub fn pull_request_url(event_type: &str, payload: &PayloadInfo) -> Option<String> {
    let number = match event_type {
        "pull_request" | "pull_request_review" | "pull_request_review_comment" => {
            payload.pull_request.number
        }
        "check_run" => payload.check_run.first_pull_request()?,
        "check_suite" => payload.check_suite.first_pull_request()?,
        "issue_comment" if payload.issue.is_pull_request() => payload.issue.number,
        _ => return None,
    };
    if number == 0 {
        return None;
    }
    let (owner, name) = payload.repository.owner_and_name()?;
    Some(format!("{GITHUB_WEB}/{owner}/{name}/pull/{number}"))
}

/// Web URL of the plain issue (never a pull request) a delivery is about.
pub fn issue_url(event_type: &str, payload: &PayloadInfo) -> Option<String> {
    if !matches!(event_type, "issues" | "issue_comment")
        || payload.issue.is_pull_request()
        || payload.issue.number == 0
    {
        return None;
    }
    let (owner, name) = payload.repository.owner_and_name()?;
    Some(format!("{GITHUB_WEB}/{owner}/{name}/issues/{}", payload.issue.number))
}

pub fn is_pull_request_merged(event_type: &str, payload: &PayloadInfo) -> bool {
    event_type == "pull_request" && payload.action == "closed" && payload.pull_request.merged
}
