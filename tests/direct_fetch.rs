//! Direct Fetch Integration Tests
//!
//! Scripted repository doubles drive the resolver's retry and error
//! classification; an axum stand-in checks the XRPC client end to end.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Barrier;

use rust_constellation::error::ValidationError;
use rust_constellation::repo::{ProfileView, RecordEnvelope, RepoApi};
use rust_constellation::resolver::{EMBED_RECORD_VIEW_TYPE, POST_VIEW_TYPE};
use rust_constellation::{DirectRecordResolver, LinkIndexConfig, RepoError, ResolveError, DIRECT_FETCH_CID};

const HANDLE_URI: &str = "at://alice.test/app.bsky.feed.post/3kabc";
const DID: &str = "did:plc:alice";

fn post_value() -> Value {
    json!({
        "$type": "app.bsky.feed.post",
        "text": "fetched without the index",
        "createdAt": "2025-03-01T12:00:00.000Z"
    })
}

fn envelope(value: Value) -> RecordEnvelope {
    RecordEnvelope {
        uri: format!("at://{}/app.bsky.feed.post/3kabc", DID),
        cid: Some("bafyrecord".to_string()),
        value,
    }
}

fn transient() -> RepoError {
    RepoError::Xrpc {
        method: "com.atproto.repo.getRecord".to_string(),
        status: 502,
        error: "Bad Gateway".to_string(),
        message: "upstream".to_string(),
    }
}

/// Repository double answering record fetches from a script, one entry per
/// call. An exhausted script reports the record missing.
struct ScriptedRepo {
    records: Mutex<VecDeque<Result<RecordEnvelope, RepoError>>>,
    profile_fails: bool,
    record_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    handle_calls: AtomicUsize,
}

impl ScriptedRepo {
    fn new(records: Vec<Result<RecordEnvelope, RepoError>>) -> Self {
        Self {
            records: Mutex::new(records.into()),
            profile_fails: false,
            record_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            handle_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RepoApi for ScriptedRepo {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RepoError> {
        self.handle_calls.fetch_add(1, Ordering::SeqCst);
        match handle {
            "alice.test" => Ok(DID.to_string()),
            _ => Err(RepoError::NotFound("Unable to resolve handle".to_string())),
        }
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RepoError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.profile_fails {
            return Err(RepoError::NotFound("Profile not found".to_string()));
        }
        Ok(ProfileView::new(actor, "alice.test"))
    }

    async fn get_record(&self, repo: &str, _collection: &str, _rkey: &str) -> Result<RecordEnvelope, RepoError> {
        assert_eq!(repo, DID);
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.records.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(RepoError::NotFound("Could not locate record".to_string())))
    }
}

#[tokio::test]
async fn test_missing_record_is_not_retried() {
    let repo = Arc::new(ScriptedRepo::new(vec![Err(RepoError::NotFound(
        "Could not locate record".to_string(),
    ))]));
    let resolver = DirectRecordResolver::new(repo.clone());

    assert!(resolver.fetch_record_and_profile(HANDLE_URI).await.is_none());
    assert_eq!(repo.handle_calls.load(Ordering::SeqCst), 1);
    assert_eq!(repo.profile_calls.load(Ordering::SeqCst), 1);
    assert_eq!(repo.record_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried_once() {
    let repo = Arc::new(ScriptedRepo::new(vec![Err(transient()), Ok(envelope(post_value()))]));
    let resolver = DirectRecordResolver::new(repo.clone());

    let view = resolver.fetch_post(HANDLE_URI).await.expect("second attempt succeeds");
    assert_eq!(view.view_type, POST_VIEW_TYPE);
    assert_eq!(view.uri, format!("at://{}/app.bsky.feed.post/3kabc", DID));
    assert_eq!(view.record, post_value());
    assert_eq!(repo.record_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_is_bounded() {
    let repo = Arc::new(ScriptedRepo::new(vec![Err(transient()), Err(transient()), Ok(envelope(post_value()))]));
    let resolver = DirectRecordResolver::new(repo.clone());

    let err = resolver.resolve(HANDLE_URI).await.unwrap_err();
    assert!(matches!(err, ResolveError::Record { .. }));
    assert_eq!(repo.record_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_did_authority_skips_handle_resolution() {
    let repo = Arc::new(ScriptedRepo::new(vec![Ok(envelope(post_value()))]));
    let resolver = DirectRecordResolver::new(repo.clone());

    let resolved = resolver
        .resolve(&format!("at://{}/app.bsky.feed.post/3kabc", DID))
        .await
        .unwrap();
    assert_eq!(resolved.author.did, DID);
    assert_eq!(repo.handle_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_profile_failure_fails_resolution() {
    let mut scripted = ScriptedRepo::new(vec![Ok(envelope(post_value()))]);
    scripted.profile_fails = true;
    let repo = Arc::new(scripted);
    let resolver = DirectRecordResolver::new(repo.clone());

    assert!(resolver.fetch_embed_record(HANDLE_URI).await.is_none());
    // The record fetch still ran; a failed profile does not cancel it.
    assert_eq!(repo.record_calls.load(Ordering::SeqCst), 1);
}

/// Repository double whose profile and record calls only return once both
/// are in flight.
struct RendezvousRepo {
    barrier: Barrier,
}

#[async_trait]
impl RepoApi for RendezvousRepo {
    async fn resolve_handle(&self, _handle: &str) -> Result<String, RepoError> {
        Ok(DID.to_string())
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView, RepoError> {
        self.barrier.wait().await;
        Ok(ProfileView::new(actor, "alice.test"))
    }

    async fn get_record(&self, _repo: &str, _collection: &str, _rkey: &str) -> Result<RecordEnvelope, RepoError> {
        self.barrier.wait().await;
        Ok(envelope(post_value()))
    }
}

#[tokio::test]
async fn test_profile_and_record_are_fetched_concurrently() {
    let repo = Arc::new(RendezvousRepo {
        barrier: Barrier::new(2),
    });
    let resolver = DirectRecordResolver::new(repo);

    let view = tokio::time::timeout(Duration::from_secs(2), resolver.fetch_post(HANDLE_URI))
        .await
        .expect("profile and record requests must overlap");
    assert!(view.is_some_and(|v| v.is_direct_fetch()));
}

#[tokio::test]
async fn test_views_reject_collections_without_schema() {
    let like_uri = format!("at://{}/app.bsky.feed.like/3kabc", DID);
    let like = json!({
        "$type": "app.bsky.feed.like",
        "subject": {"uri": "at://did:plc:bob/app.bsky.feed.post/1", "cid": "bafysubject"},
        "createdAt": "2025-03-01T12:00:00Z"
    });
    let repo = Arc::new(ScriptedRepo::new(vec![Ok(envelope(like.clone())), Ok(envelope(like))]));
    let resolver = DirectRecordResolver::new(repo);

    match resolver.resolve_post(&like_uri).await.unwrap_err() {
        ResolveError::Validation {
            source: ValidationError::UnsupportedCollection(collection),
            ..
        } => assert_eq!(collection, "app.bsky.feed.like"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(resolver.fetch_embed_record(&like_uri).await.is_none());
}

#[tokio::test]
async fn test_invalid_post_is_dropped_from_views() {
    let bad = json!({"$type": "app.bsky.feed.post", "createdAt": "2025-03-01T12:00:00Z"});
    let repo = Arc::new(ScriptedRepo::new(vec![Ok(envelope(bad.clone())), Ok(envelope(bad))]));
    let resolver = DirectRecordResolver::new(repo);

    // The raw pair is still available; only post-shaped views reject it.
    assert!(resolver.fetch_record_and_profile(HANDLE_URI).await.is_some());
    let err = resolver.resolve_post(HANDLE_URI).await.unwrap_err();
    assert!(matches!(err, ResolveError::Validation { .. }));
}

#[derive(Clone, Default)]
struct XrpcMock {
    /// 502 responses to send before a record is served.
    transient_failures: Arc<AtomicUsize>,
    record_missing: bool,
    record_hits: Arc<AtomicUsize>,
    record_params: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn resolve_handle(Query(params): Query<HashMap<String, String>>) -> Response {
    match params.get("handle").map(String::as_str) {
        Some("alice.test") => Json(json!({"did": DID})).into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "InvalidRequest", "message": "Unable to resolve handle"})),
        )
            .into_response(),
    }
}

async fn get_profile(Query(params): Query<HashMap<String, String>>) -> Response {
    Json(json!({
        "did": params.get("actor").cloned().unwrap_or_default(),
        "handle": "alice.test",
        "displayName": "Alice",
        "followersCount": 3
    }))
    .into_response()
}

async fn get_record(State(mock): State<XrpcMock>, Query(params): Query<HashMap<String, String>>) -> Response {
    mock.record_hits.fetch_add(1, Ordering::SeqCst);
    mock.record_params.lock().unwrap().push(params);

    if mock.record_missing {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "RecordNotFound",
                "message": format!("Could not locate record: at://{}/app.bsky.feed.post/3kabc", DID)
            })),
        )
            .into_response();
    }

    let pending = mock.transient_failures.load(Ordering::SeqCst);
    if pending > 0 {
        mock.transient_failures.store(pending - 1, Ordering::SeqCst);
        return (StatusCode::BAD_GATEWAY, "<html>upstream unavailable</html>").into_response();
    }

    Json(json!({
        "uri": format!("at://{}/app.bsky.feed.post/3kabc", DID),
        "cid": "bafyrecord",
        "value": post_value()
    }))
    .into_response()
}

async fn spawn_repo_service(mock: XrpcMock) -> DirectRecordResolver {
    let app = Router::new()
        .route("/xrpc/com.atproto.identity.resolveHandle", get(resolve_handle))
        .route("/xrpc/app.bsky.actor.getProfile", get(get_profile))
        .route("/xrpc/com.atproto.repo.getRecord", get(get_record))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let config = LinkIndexConfig {
        repo_service_url: format!("http://{}", addr),
        retry_backoff_ms: 0,
        ..LinkIndexConfig::default()
    };
    DirectRecordResolver::from_config(Arc::new(config)).unwrap()
}

#[tokio::test]
async fn test_xrpc_record_not_found_makes_one_request() {
    let mock = XrpcMock {
        record_missing: true,
        ..XrpcMock::default()
    };
    let resolver = spawn_repo_service(mock.clone()).await;

    assert!(resolver.fetch_embed_record(HANDLE_URI).await.is_none());
    assert_eq!(mock.record_hits.load(Ordering::SeqCst), 1);

    let params = mock.record_params.lock().unwrap();
    assert_eq!(params[0]["repo"], DID);
    assert_eq!(params[0]["collection"], "app.bsky.feed.post");
    assert_eq!(params[0]["rkey"], "3kabc");
}

#[tokio::test]
async fn test_xrpc_gateway_error_then_success() {
    let mock = XrpcMock {
        transient_failures: Arc::new(AtomicUsize::new(1)),
        ..XrpcMock::default()
    };
    let resolver = spawn_repo_service(mock.clone()).await;

    let view = resolver.fetch_embed_record(HANDLE_URI).await.expect("retry recovers");
    assert_eq!(mock.record_hits.load(Ordering::SeqCst), 2);

    assert_eq!(view.view_type, EMBED_RECORD_VIEW_TYPE);
    assert_eq!(view.cid, DIRECT_FETCH_CID);
    assert!(view.is_direct_fetch());
    assert_eq!(view.author.display_name.as_deref(), Some("Alice"));
    assert_eq!(view.author.extra["followersCount"], 3);
    assert_eq!(view.value, post_value());
}

#[tokio::test]
async fn test_xrpc_unknown_handle() {
    let resolver = spawn_repo_service(XrpcMock::default()).await;

    let err = resolver
        .resolve("at://nobody.test/app.bsky.feed.post/3kabc")
        .await
        .unwrap_err();
    match err {
        ResolveError::Handle { handle, source } => {
            assert_eq!(handle, "nobody.test");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected {:?}", other),
    }
}
