//! Direct Record Resolver
//!
//! Fallback path for records the index cannot serve: resolve the author,
//! then fetch the profile and the record straight from the repository API.
//!
//! Records obtained this way have no content identifier, so the views built
//! here carry [`DIRECT_FETCH_CID`] instead. Consumers can check for it to
//! tell directly fetched records from indexed ones.

pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LinkIndexConfig;
use crate::error::{ConfigError, RepoError, ResolveError};
use crate::repo::{ProfileView, RepoApi, XrpcRepoClient};
use crate::retry::RetryPolicy;
use crate::uri::AtUri;

/// Content identifier placed on every directly fetched view.
pub const DIRECT_FETCH_CID: &str = "directfetch";

/// Total attempts for the record fetch (first try plus one retry).
pub const RECORD_FETCH_ATTEMPTS: usize = 2;

pub const EMBED_RECORD_VIEW_TYPE: &str = "app.bsky.embed.record#viewRecord";
pub const POST_VIEW_TYPE: &str = "app.bsky.feed.defs#postView";

/// A record together with its author, addressed by a DID-based uri.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedRecord {
    pub author: ProfileView,
    pub record: Value,
    pub uri: AtUri,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedRecordView {
    #[serde(rename = "$type")]
    pub view_type: String,
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    pub value: Value,
    pub indexed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "$type")]
    pub view_type: String,
    pub uri: String,
    pub cid: String,
    pub author: ProfileView,
    pub record: Value,
    pub indexed_at: String,
}

impl EmbedRecordView {
    pub fn is_direct_fetch(&self) -> bool {
        self.cid == DIRECT_FETCH_CID
    }
}

impl PostView {
    pub fn is_direct_fetch(&self) -> bool {
        self.cid == DIRECT_FETCH_CID
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct DirectRecordResolver {
    repo: Arc<dyn RepoApi>,
    retry: RetryPolicy,
}

impl DirectRecordResolver {
    pub fn new(repo: Arc<dyn RepoApi>) -> Self {
        Self {
            repo,
            retry: RetryPolicy::new(RECORD_FETCH_ATTEMPTS),
        }
    }

    /// Resolver backed by the XRPC service named in `config`, with the
    /// configured retry backoff.
    pub fn from_config(config: Arc<LinkIndexConfig>) -> Result<Self, ConfigError> {
        let backoff = config.retry_backoff();
        let repo = XrpcRepoClient::new(config)?;
        Ok(Self::new(Arc::new(repo)).with_backoff(backoff, backoff * 4))
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry = self.retry.with_backoff(initial, max);
        self
    }

    /// Resolve `uri` to its record and author profile.
    ///
    /// A handle authority is resolved once, without retry. The profile and
    /// record requests then run concurrently; the record fetch is retried
    /// once unless the record is reported missing. Both must succeed.
    pub async fn resolve(&self, uri: &str) -> Result<ResolvedRecord, ResolveError> {
        let parsed = AtUri::parse(uri)?;

        let did = if parsed.has_did() {
            parsed.authority.clone()
        } else {
            self.repo
                .resolve_handle(&parsed.authority)
                .await
                .map_err(|source| ResolveError::Handle {
                    handle: parsed.authority.clone(),
                    source,
                })?
        };
        let canonical = parsed.with_authority(did.as_str());

        let (profile, record) = tokio::join!(
            self.repo.get_profile(&did),
            self.retry.run(RepoError::is_retryable, || {
                self.repo.get_record(&did, &canonical.collection, &canonical.rkey)
            }),
        );

        let author = profile.map_err(|source| ResolveError::Profile {
            did: did.clone(),
            source,
        })?;
        let record = record.map_err(|source| ResolveError::Record {
            uri: canonical.to_string(),
            source,
        })?;

        debug!("Directly fetched {}", canonical);
        Ok(ResolvedRecord {
            author,
            record: record.value,
            uri: canonical,
        })
    }

    /// Like [`resolve`](Self::resolve) but never fails: errors are logged
    /// and reported as `None`.
    pub async fn fetch_record_and_profile(&self, uri: &str) -> Option<ResolvedRecord> {
        discard(uri, self.resolve(uri).await)
    }

    pub async fn resolve_embed_record(&self, uri: &str) -> Result<EmbedRecordView, ResolveError> {
        let resolved = self.resolve_post_record(uri).await?;
        Ok(EmbedRecordView {
            view_type: EMBED_RECORD_VIEW_TYPE.to_string(),
            uri: resolved.uri.to_string(),
            cid: DIRECT_FETCH_CID.to_string(),
            author: resolved.author,
            value: resolved.record,
            indexed_at: now_timestamp(),
        })
    }

    pub async fn fetch_embed_record(&self, uri: &str) -> Option<EmbedRecordView> {
        discard(uri, self.resolve_embed_record(uri).await)
    }

    pub async fn resolve_post(&self, uri: &str) -> Result<PostView, ResolveError> {
        let resolved = self.resolve_post_record(uri).await?;
        Ok(PostView {
            view_type: POST_VIEW_TYPE.to_string(),
            uri: resolved.uri.to_string(),
            cid: DIRECT_FETCH_CID.to_string(),
            author: resolved.author,
            record: resolved.record,
            indexed_at: now_timestamp(),
        })
    }

    pub async fn fetch_post(&self, uri: &str) -> Option<PostView> {
        discard(uri, self.resolve_post(uri).await)
    }

    async fn resolve_post_record(&self, uri: &str) -> Result<ResolvedRecord, ResolveError> {
        let resolved = self.resolve(uri).await?;
        validate::validate_record(&resolved.uri.collection, &resolved.record).map_err(|source| {
            ResolveError::Validation {
                uri: resolved.uri.to_string(),
                source,
            }
        })?;
        Ok(resolved)
    }
}

fn discard<T>(uri: &str, result: Result<T, ResolveError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e @ ResolveError::Validation { .. }) => {
            debug!("Discarding directly fetched {}: {}", uri, e);
            None
        }
        Err(e) => {
            warn!("Direct fetch of {} failed: {}", uri, e);
            None
        }
    }
}
