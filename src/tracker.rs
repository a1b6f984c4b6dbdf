use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// One tracker issue. `id` is the tracker's storage key used by the update
/// endpoint; `iid` is the user-facing ticket number used for lookup.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Issue {
    pub(crate) id: i64,
    pub(crate) iid: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub(crate) description: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Error)]
pub(crate) enum TrackerError {
    #[error("Issue not found")]
    NotFound,
    #[error("HTTP Error: {0}")]
    RemoteError(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid tracker response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Builds the project API base from the configured origin and project path.
/// Only the first slash of the project path is escaped; that is the segment
/// separator the tracker's path grammar cares about.
pub(crate) fn project_base_url(origin: &str, repo: &str) -> String {
    format!(
        "{}/api/v3/projects/{}",
        origin.trim_end_matches('/'),
        repo.replacen('/', "%2F", 1)
    )
}

pub(crate) struct TrackerClient {
    http: Client,
    base_url: String,
    token: String,
}

impl TrackerClient {
    pub(crate) fn new(base_url: String, token: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
            token,
        }
    }

    /// Looks up an issue by its user-facing ticket number. The tracker may
    /// return several matches for an iid filter; the first one wins.
    pub(crate) fn fetch(&self, external_id: u64) -> Result<Issue, TrackerError> {
        let url = format!("{}/issues?iid={}", self.base_url, external_id);
        let response = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.token)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::RemoteError(status.as_u16()));
        }
        let body = response.text()?;
        let mut list: Vec<Issue> = serde_json::from_str(&body)?;
        if list.is_empty() {
            return Err(TrackerError::NotFound);
        }
        Ok(list.remove(0))
    }

    /// Pushes a new description for an already-resolved issue. No retries;
    /// the caller decides what a failed push means.
    pub(crate) fn update(&self, issue: &Issue, new_description: &str) -> Result<(), TrackerError> {
        let url = format!("{}/issues/{}", self.base_url, issue.id);
        let response = self
            .http
            .put(&url)
            .query(&[("description", new_description)])
            .header(TOKEN_HEADER, &self.token)
            .send()?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TrackerError::RemoteError(status.as_u16()))
        }
    }
}
