// shared fakes and fixtures for the crate tests
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;

use crate::auth0::TokenClient;
use crate::config::services::Auth0Config;
use crate::error::TokenError;
use crate::helpers::time::now_utc;
use crate::notify::Notifier;
use crate::resilience::retry::RetrySettings;
use crate::store::document::DocumentStore;
use crate::transport::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};

pub const SIGNING_KID: &str = "signing-kid";
pub const ROGUE_KID: &str = "rogue-kid";

const SIGNING_KEY: &str = include_str!("../fixtures/signing_key.pem");
const ROGUE_KEY: &str = include_str!("../fixtures/rogue_key.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");
const JWKS_ROTATED: &str = include_str!("../fixtures/jwks_rotated.json");

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

// ---------------------------------------------------------------------------
// tokens
// ---------------------------------------------------------------------------

pub fn jwks_json() -> String {
    JWKS.to_owned()
}

pub fn rotated_jwks_json() -> String {
    JWKS_ROTATED.to_owned()
}

fn claims(exp_in_secs: i64) -> Value {
    let now = now_utc().timestamp();
    json!({
        "iss": "https://tenant.auth0.local/",
        "sub": "client-id@clients",
        "aud": "https://api.local",
        "iat": now,
        "exp": now + exp_in_secs,
        "gty": "client-credentials",
    })
}

/// RS256 token signed by the key published in `jwks.json`.
pub fn signed_token(exp_in_secs: i64) -> String {
    sign(SIGNING_KEY, Some(SIGNING_KID), exp_in_secs)
}

/// RS256 token signed by the key published only in `jwks_rotated.json`.
pub fn rogue_token(exp_in_secs: i64) -> String {
    sign(ROGUE_KEY, Some(ROGUE_KID), exp_in_secs)
}

/// Signed by the rogue key but claiming the published kid.
pub fn forged_token(exp_in_secs: i64) -> String {
    sign(ROGUE_KEY, Some(SIGNING_KID), exp_in_secs)
}

pub fn token_without_kid(exp_in_secs: i64) -> String {
    sign(SIGNING_KEY, None, exp_in_secs)
}

pub fn hs256_token(exp_in_secs: i64) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(SIGNING_KID.to_owned());
    encode(&header, &claims(exp_in_secs), &EncodingKey::from_secret(b"shared-secret")).unwrap()
}

fn sign(pem: &str, kid: Option<&str>, exp_in_secs: i64) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_owned);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    encode(&header, &claims(exp_in_secs), &key).unwrap()
}

// ---------------------------------------------------------------------------
// document store
// ---------------------------------------------------------------------------

/// In-memory store with Elasticsearch semantics: searching an index that was
/// never written reports `IndexNotFound`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, HashMap<String, Value>>>,
    failing: Mutex<HashSet<String>>,
    searches: Mutex<HashMap<String, usize>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl MemoryDocumentStore {
    pub fn put(&self, index: &str, id: &str, body: Value) {
        self.documents
            .lock()
            .unwrap()
            .entry(index.to_owned())
            .or_default()
            .insert(id.to_owned(), body);
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.documents.lock().unwrap().get(index).and_then(|docs| docs.get(id).cloned())
    }

    /// Every later call against `index` fails with a store error.
    pub fn fail_index(&self, index: &str) {
        self.failing.lock().unwrap().insert(index.to_owned());
    }

    pub fn searches(&self, index: &str) -> usize {
        self.searches.lock().unwrap().get(index).copied().unwrap_or(0)
    }

    pub fn writes(&self, index: &str) -> usize {
        self.writes.lock().unwrap().get(index).copied().unwrap_or(0)
    }

    fn check(&self, index: &str) -> Result<(), TokenError> {
        if self.failing.lock().unwrap().contains(index) {
            return Err(TokenError::Store(format!("[503] unavailable: {}", index)));
        }
        Ok(())
    }

    fn count_write(&self, index: &str) {
        *self.writes.lock().unwrap().entry(index.to_owned()).or_default() += 1;
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn search(&self, index: &str, query: &Value) -> Result<Vec<u8>, TokenError> {
        *self.searches.lock().unwrap().entry(index.to_owned()).or_default() += 1;
        self.check(index)?;

        let documents = self.documents.lock().unwrap();
        let Some(docs) = documents.get(index) else {
            return Err(TokenError::IndexNotFound(index.to_owned()));
        };
        let id = query["query"]["term"]["_id"].as_str().unwrap_or_default();
        let hits: Vec<Value> = docs
            .get(id)
            .map(|source| vec![json!({"_index": index, "_id": id, "_source": source})])
            .unwrap_or_default();

        Ok(serde_json::to_vec(&json!({"hits": {"hits": hits}}))?)
    }

    async fn create_document(&self, index: &str, id: &str, body: &Value) -> Result<Vec<u8>, TokenError> {
        self.check(index)?;
        self.count_write(index);
        self.put(index, id, body.clone());
        Ok(serde_json::to_vec(&json!({"result": "created"}))?)
    }

    async fn update_document(&self, index: &str, id: &str, body: &Value) -> Result<Vec<u8>, TokenError> {
        self.check(index)?;
        self.count_write(index);
        let mut merged = self.document(index, id).unwrap_or_else(|| json!({}));
        if let (Some(target), Some(fields)) = (merged.as_object_mut(), body.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        self.put(index, id, merged);
        Ok(serde_json::to_vec(&json!({"result": "updated"}))?)
    }
}

// ---------------------------------------------------------------------------
// notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(&self, text: &str) -> Result<(), TokenError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TokenError::Notify("webhook down".to_owned()));
        }
        self.messages.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// identity provider
// ---------------------------------------------------------------------------

/// Serves a fixed JWKS body without a network round trip.
pub struct StaticJwksClient {
    body: Option<String>,
    calls: AtomicUsize,
}

impl StaticJwksClient {
    pub fn new(body: String) -> Self {
        Self { body: Some(body), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { body: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for StaticJwksClient {
    async fn request(&self, _request: HttpRequest) -> Result<HttpResponse, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Some(body) => Ok(HttpResponse { status: StatusCode::OK, body: body.clone().into_bytes() }),
            None => Err(TokenError::Transport("connection refused".to_owned())),
        }
    }
}

#[derive(Clone)]
pub enum TokenReply {
    Token(String),
    Status(u16),
    Body(String),
}

#[derive(Clone)]
pub struct ProviderFake {
    token_calls: Arc<AtomicUsize>,
    jwks_calls: Arc<AtomicUsize>,
    token_reply: Arc<Mutex<TokenReply>>,
    jwks: Arc<Mutex<String>>,
    last_token_request: Arc<Mutex<Option<Value>>>,
}

impl ProviderFake {
    pub fn new(reply: TokenReply) -> Self {
        Self {
            token_calls: Arc::new(AtomicUsize::new(0)),
            jwks_calls: Arc::new(AtomicUsize::new(0)),
            token_reply: Arc::new(Mutex::new(reply)),
            jwks: Arc::new(Mutex::new(jwks_json())),
            last_token_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Start serving `/oauth/token` and the JWKS endpoint; returns the base url.
    pub async fn start(&self) -> String {
        let router = Router::new()
            .route("/oauth/token", post(token_handler))
            .route("/oauth/.well-known/jwks.json", get(jwks_handler))
            .with_state(self.clone());
        let (_handle, addr) = spawn_axum(router).await;
        format!("http://{}", addr)
    }

    pub fn reply_with(&self, reply: TokenReply) {
        *self.token_reply.lock().unwrap() = reply;
    }

    pub fn publish_jwks(&self, jwks: String) {
        *self.jwks.lock().unwrap() = jwks;
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn jwks_calls(&self) -> usize {
        self.jwks_calls.load(Ordering::SeqCst)
    }

    pub fn last_token_request(&self) -> Option<Value> {
        self.last_token_request.lock().unwrap().clone()
    }
}

async fn token_handler(State(fake): State<ProviderFake>, Json(body): Json<Value>) -> (StatusCode, String) {
    fake.token_calls.fetch_add(1, Ordering::SeqCst);
    *fake.last_token_request.lock().unwrap() = Some(body);
    let reply = fake.token_reply.lock().unwrap().clone();
    match reply {
        TokenReply::Token(token) => (
            StatusCode::OK,
            json!({
                "access_token": token,
                "scope": "read:all",
                "expires_in": 86400,
                "token_type": "Bearer"
            })
            .to_string(),
        ),
        TokenReply::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            json!({"error": "access_denied", "error_description": "Unauthorized"}).to_string(),
        ),
        TokenReply::Body(body) => (StatusCode::OK, body),
    }
}

async fn jwks_handler(State(fake): State<ProviderFake>) -> (StatusCode, String) {
    fake.jwks_calls.fetch_add(1, Ordering::SeqCst);
    let jwks = fake.jwks.lock().unwrap().clone();
    (StatusCode::OK, jwks)
}

// ---------------------------------------------------------------------------
// wiring
// ---------------------------------------------------------------------------

pub fn auth0_config(url: &str) -> Auth0Config {
    Auth0Config {
        environment: "test".to_owned(),
        app_name: "insights".to_owned(),
        grant_type: "client_credentials".to_owned(),
        client_id: "client-id".to_owned(),
        client_secret: "client-secret".to_owned(),
        audience: "https://api.local".to_owned(),
        url: url.to_owned(),
        refresh_margin_seconds: 300,
        refresh_ahead_seconds: 3600,
    }
}

pub fn no_retry() -> RetrySettings {
    RetrySettings { attempts: 1, base_delay_ms: 1, max_delay_ms: 1 }
}

pub fn token_client(url: &str, documents: Arc<MemoryDocumentStore>, notifier: Arc<RecordingNotifier>) -> TokenClient {
    let http = Arc::new(ReqwestHttpClient::new(std::time::Duration::from_secs(5)).unwrap());
    TokenClient::new(&auth0_config(url), http, documents, notifier, no_retry())
}
