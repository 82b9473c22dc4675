use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ProfileView, RecordEnvelope, RepoApi};
use crate::config::{endpoint, parse_base, LinkIndexConfig};
use crate::error::{ConfigError, RepoError};
use crate::utils::truncate::{truncate_body, MAX_DIAGNOSTIC_BYTES};

const RESOLVE_HANDLE: &str = "com.atproto.identity.resolveHandle";
const GET_PROFILE: &str = "app.bsky.actor.getProfile";
const GET_RECORD: &str = "com.atproto.repo.getRecord";

/// Error names and messages XRPC services use for missing handles,
/// profiles and records.
const NOT_FOUND_ERRORS: &[&str] = &["RecordNotFound", "NotFound", "ProfileNotFound"];
const NOT_FOUND_MESSAGES: &[&str] = &[
    "Could not locate record",
    "Profile not found",
    "Unable to resolve handle",
];

#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResolveHandleOutput {
    did: String,
}

/// Repository client speaking XRPC over HTTP.
#[derive(Debug, Clone)]
pub struct XrpcRepoClient {
    client: Client,
    resolve_handle_url: Url,
    get_profile_url: Url,
    get_record_url: Url,
}

impl XrpcRepoClient {
    pub fn new(config: Arc<LinkIndexConfig>) -> Result<Self, ConfigError> {
        let client = config.http_client()?;
        Self::with_client(&config.repo_service_url, client)
    }

    pub fn with_client(service_url: &str, client: Client) -> Result<Self, ConfigError> {
        let service = parse_base(service_url)?;
        let method_url = |method: &str| endpoint(&service, &format!("xrpc/{}", method));
        Ok(Self {
            resolve_handle_url: method_url(RESOLVE_HANDLE)?,
            get_profile_url: method_url(GET_PROFILE)?,
            get_record_url: method_url(GET_RECORD)?,
            client,
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        method: &str,
        url: &Url,
        params: &[(&str, &str)],
    ) -> Result<T, RepoError> {
        debug!("XRPC {} {:?}", method, params);

        let response = self.client.get(url.clone()).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(method, status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Turn a failed XRPC response into a typed error. This is the only place
/// error text is inspected.
fn classify_failure(method: &str, status: StatusCode, body: &str) -> RepoError {
    let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or_default();
    let error = parsed.error.unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
    let message = parsed
        .message
        .unwrap_or_else(|| truncate_body(body, MAX_DIAGNOSTIC_BYTES));

    let not_found = status == StatusCode::NOT_FOUND
        || NOT_FOUND_ERRORS.contains(&error.as_str())
        || NOT_FOUND_MESSAGES.iter().any(|m| message.contains(m));

    if not_found {
        RepoError::NotFound(message)
    } else {
        RepoError::Xrpc {
            method: method.to_string(),
            status: status.as_u16(),
            error,
            message,
        }
    }
}

#[async_trait]
impl RepoApi for XrpcRepoClient {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RepoError> {
        let output: ResolveHandleOutput = self
            .query(RESOLVE_HANDLE, &self.resolve_handle_url, &[("handle", handle)])
            .await?;
        Ok(output.did)
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RepoError> {
        self.query(GET_PROFILE, &self.get_profile_url, &[("actor", actor)]).await
    }

    async fn get_record(&self, repo: &str, collection: &str, rkey: &str) -> Result<RecordEnvelope, RepoError> {
        self.query(
            GET_RECORD,
            &self.get_record_url,
            &[("repo", repo), ("collection", collection), ("rkey", rkey)],
        )
        .await
    }
}
