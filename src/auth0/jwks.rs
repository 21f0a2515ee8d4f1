//! Provider signing keys with a 30 minute freshness window.
//!
//! Lookup order: the in-memory copy held by this cache, the document store
//! record shared by every process of the environment, then the provider's
//! JWKS endpoint. A fetched set overwrites both cached copies. A kid that is
//! still unknown after a re-fetch is answered from memory for a minute.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet};
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::TokenError;
use crate::helpers::time::{is_within_window, now_utc};
use crate::observability::metrics::get_metrics;
use crate::store::token_store::TokenStore;
use crate::transport::{HttpClient, HttpRequest};
use crate::utils::constants::{JWKS_FRESHNESS_SECS, JWKS_MISSING_KID_RETRY_SECS};

#[derive(Clone)]
struct CachedSet {
    keys: Arc<JwkSet>,
    fetched_at: DateTime<Utc>,
}

pub struct JwksCache {
    http: Arc<dyn HttpClient>,
    store: TokenStore,
    url: String,
    memo: RwLock<Option<CachedSet>>,
    missing: RwLock<Option<(String, DateTime<Utc>)>>,
}

impl JwksCache {
    pub fn new(http: Arc<dyn HttpClient>, store: TokenStore, url: impl Into<String>) -> Self {
        Self {
            http,
            store,
            url: url.into(),
            memo: RwLock::new(None),
            missing: RwLock::new(None),
        }
    }

    /// Resolve the verification key for `kid`, re-fetching once when the
    /// cached set is stale or does not know the key.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        if let Some(cached) = self.fresh_cached().await {
            if let Some(key) = find_key(&cached.keys, kid) {
                return key;
            }
            if self.recently_missing(kid).await {
                debug!(kid, "kid missing after a recent re-fetch");
                return Err(TokenError::KeyNotFound(kid.to_owned()));
            }
            debug!(kid, "kid not in cached jwks, re-fetching");
        }

        let fetched = self.fetch().await?;
        match find_key(&fetched.keys, kid) {
            Some(key) => key,
            None => {
                *self.missing.write().await = Some((kid.to_owned(), now_utc()));
                Err(TokenError::KeyNotFound(kid.to_owned()))
            }
        }
    }

    async fn recently_missing(&self, kid: &str) -> bool {
        match self.missing.read().await.as_ref() {
            Some((missing, at)) => {
                missing == kid
                    && is_within_window(*at, Duration::seconds(JWKS_MISSING_KID_RETRY_SECS), now_utc())
            }
            None => false,
        }
    }

    async fn fresh_cached(&self) -> Option<CachedSet> {
        let now = now_utc();
        if let Some(memo) = self.memo.read().await.as_ref() {
            if is_fresh(memo.fetched_at, now) {
                return Some(memo.clone());
            }
        }

        let record = match self.store.cached_jwks().await {
            Ok(Some(record)) if is_fresh(record.created_at, now) => record,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "could not read cached jwks");
                return None;
            }
        };
        let keys: JwkSet = match serde_json::from_str(&record.jwks) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "cached jwks is not a valid key set");
                return None;
            }
        };

        let cached = CachedSet {
            keys: Arc::new(keys),
            fetched_at: record.created_at,
        };
        *self.memo.write().await = Some(cached.clone());
        Some(cached)
    }

    async fn fetch(&self) -> Result<CachedSet, TokenError> {
        info!(url = %self.url, "fetching jwks");
        get_metrics().await.jwks_fetches.inc();

        let response = self.http.request(HttpRequest::get(&self.url)).await?;
        if !response.is_success() {
            return Err(TokenError::Transport(format!(
                "jwks endpoint responded {}: {}",
                response.status,
                response.text()
            )));
        }
        let keys: JwkSet = response.json()?;

        if let Err(e) = self.store.save_jwks(&response.text()).await {
            warn!(error = %e, "could not cache jwks");
            get_metrics().await.store_failures.with_label_values(&["save_jwks"]).inc();
        }

        let cached = CachedSet {
            keys: Arc::new(keys),
            fetched_at: now_utc(),
        };
        *self.memo.write().await = Some(cached.clone());
        Ok(cached)
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    is_within_window(fetched_at, Duration::seconds(JWKS_FRESHNESS_SECS), now)
}

/// `None` when the set has no such key; a present key that is not RSA or
/// cannot be decoded is an error.
fn find_key(keys: &JwkSet, kid: &str) -> Option<Result<DecodingKey, TokenError>> {
    let jwk = keys.find(kid)?;
    if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
        return Some(Err(TokenError::UnexpectedSigningMethod(format!(
            "key {kid} is not an RSA key"
        ))));
    }
    Some(DecodingKey::from_jwk(jwk).map_err(|e| TokenError::Malformed(format!("key {kid}: {e}"))))
}
