//! Minimal structural view of a webhook payload.
//!
//! GitHub sends a dozen differently shaped payloads. Instead of one type per
//! event, [`PayloadInfo`] is a single permissive record: every field is
//! optional, unknown fields are ignored, and anything absent decodes to its
//! zero value. Derivation code treats zero values as "not present".

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PayloadInfo {
    #[serde(deserialize_with = "nullable")]
    pub action: String,
    #[serde(deserialize_with = "nullable")]
    pub repository: Repository,
    #[serde(deserialize_with = "nullable")]
    pub pull_request: PullRequest,
    #[serde(deserialize_with = "nullable")]
    pub issue: Issue,
    #[serde(deserialize_with = "nullable")]
    pub organization: Organization,
    #[serde(deserialize_with = "nullable")]
    pub check_run: CheckRef,
    #[serde(deserialize_with = "nullable")]
    pub check_suite: CheckRef,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Repository {
    #[serde(deserialize_with = "nullable")]
    pub full_name: String,
    #[serde(deserialize_with = "nullable")]
    pub owner: Account,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(deserialize_with = "nullable")]
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    #[serde(deserialize_with = "nullable")]
    pub number: u64,
    #[serde(deserialize_with = "nullable")]
    pub merged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Issue {
    #[serde(deserialize_with = "nullable")]
    pub number: u64,
    /// GitHub models pull requests as issues; an issue that is really a PR
    /// carries a `pull_request` object. Only its presence matters.
    pub pull_request: Option<IgnoredAny>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Organization {
    #[serde(deserialize_with = "nullable")]
    pub login: String,
}

/// The `check_run` / `check_suite` object; only linked PRs are of interest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CheckRef {
    #[serde(deserialize_with = "nullable")]
    pub pull_requests: Vec<PullRequestRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PullRequestRef {
    #[serde(deserialize_with = "nullable")]
    pub number: u64,
}

/// `null` decodes like an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PayloadInfo {
    /// Parses the raw body. Callers that must not fail on a cosmetic
    /// malformation fall back to [`PayloadInfo::default`].
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

impl Repository {
    /// `(owner, name)` when both are known.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        if self.owner.login.is_empty() || self.name.is_empty() {
            return None;
        }
        Some((&self.owner.login, &self.name))
    }
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl CheckRef {
    /// Number of the first linked pull request, if any.
    pub fn first_pull_request(&self) -> Option<u64> {
        self.pull_requests
            .first()
            .map(|pr| pr.number)
            .filter(|n| *n != 0)
    }
}
