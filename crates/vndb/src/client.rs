// VNDB user-list client
//
// Design Decision: Every transport failure becomes an Outcome, never an error;
// the batch engine decides about retries.
// Design Decision: A missing token short-circuits before any request is built.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::trace;
use ulist_batch::{FailureReason, LabelChange, Outcome, RemoteLabeler};

use crate::id::normalize_vn_id;
use crate::VndbError;

/// Default API root
pub const DEFAULT_API_URL: &str = "https://api.vndb.org/kana";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Client configuration
#[derive(Debug, Clone)]
pub struct VndbClientConfig {
    /// API root, without trailing slash
    pub base_url: String,

    /// API token; `None` or blank means no credential
    pub token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for VndbClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl VndbClientConfig {
    /// Create a configuration for the public API with `token`
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            ..Default::default()
        }
    }

    /// Set the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Body of `PATCH /ulist/<id>`
#[derive(Debug, Serialize, PartialEq)]
struct LabelPatch {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels_set: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels_unset: Vec<u32>,
}

impl From<LabelChange> for LabelPatch {
    fn from(change: LabelChange) -> Self {
        if change.set {
            Self {
                labels_set: vec![change.label],
                labels_unset: vec![],
            }
        } else {
            Self {
                labels_set: vec![],
                labels_unset: vec![change.label],
            }
        }
    }
}

/// Applies label changes to the authenticated user's VNDB list
pub struct VndbClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl VndbClient {
    /// Build a client
    pub fn new(config: VndbClientConfig) -> Result<Self, VndbError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        let token = config
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    /// Check if a credential is configured
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn ulist_url(&self, item_id: &str) -> String {
        format!("{}/ulist/v{}", self.base_url, normalize_vn_id(item_id))
    }
}

#[async_trait]
impl RemoteLabeler for VndbClient {
    async fn apply(&self, item_id: &str, change: LabelChange, attempt: u32) -> Outcome {
        let Some(token) = self.token.as_deref() else {
            return Outcome::failure(FailureReason::AuthMissing);
        };

        let url = self.ulist_url(item_id);
        trace!(%url, attempt, label = change.label, set = change.set, "PATCH ulist");

        let response = self
            .http
            .patch(&url)
            .header(AUTHORIZATION, format!("token {token}"))
            .json(&LabelPatch::from(change))
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Outcome::Success;
                }
                let body = response.text().await.unwrap_or_default();
                Outcome::from_status(status.as_u16(), body)
            }
            Err(e) if e.is_timeout() => Outcome::failure(FailureReason::Timeout),
            Err(e) => Outcome::failure(FailureReason::Network {
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_body() {
        let set = serde_json::to_value(LabelPatch::from(LabelChange::set(6))).unwrap();
        assert_eq!(set, serde_json::json!({"labels_set": [6]}));

        let unset = serde_json::to_value(LabelPatch::from(LabelChange::unset(5))).unwrap();
        assert_eq!(unset, serde_json::json!({"labels_unset": [5]}));
    }

    #[test]
    fn test_blank_token_is_missing() {
        let client = VndbClient::new(VndbClientConfig::new(Some("   ".to_string()))).unwrap();
        assert!(!client.has_token());

        let client = VndbClient::new(VndbClientConfig::new(Some(" abc ".to_string()))).unwrap();
        assert!(client.has_token());
    }

    #[test]
    fn test_ulist_url() {
        let client = VndbClient::new(
            VndbClientConfig::new(None).with_base_url("http://localhost:8080/kana/"),
        )
        .unwrap();

        assert_eq!(client.ulist_url("v17"), "http://localhost:8080/kana/ulist/v17");
        assert_eq!(client.ulist_url("42"), "http://localhost:8080/kana/ulist/v42");
    }

    #[tokio::test]
    async fn test_missing_token_sends_nothing() {
        let client = VndbClient::new(
            VndbClientConfig::new(None).with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();

        let outcome = client.apply("v1", LabelChange::set(6), 0).await;
        assert_eq!(outcome, Outcome::TerminalFailure(FailureReason::AuthMissing));
    }
}
