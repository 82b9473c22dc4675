//! Repository API
//!
//! The authoritative-repository calls direct record resolution needs:
//! handle resolution, profile lookup, and single-record fetch. Every
//! implementation must report a missing handle/profile/record as
//! `RepoError::NotFound` so callers can tell it apart from transport
//! trouble.

mod xrpc;

pub use xrpc::XrpcRepoClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RepoError;

/// Profile as returned by `app.bsky.actor.getProfile`. Fields this crate
/// does not use are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileView {
    pub fn new(did: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            handle: handle.into(),
            display_name: None,
            description: None,
            avatar: None,
            banner: None,
            extra: Map::new(),
        }
    }
}

/// Raw record as stored in the author's repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub value: Value,
}

#[async_trait]
pub trait RepoApi: Send + Sync {
    /// Resolve a handle (e.g. `alice.example.com`) to its DID.
    async fn resolve_handle(&self, handle: &str) -> Result<String, RepoError>;

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RepoError>;

    async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordEnvelope, RepoError>;
}
