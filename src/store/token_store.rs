use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::TokenError;
use crate::helpers::time::now_utc;
use crate::resilience::retry::RetrySettings;
use crate::store::document::{term_id_query, DocumentStore, SearchResponse};
use crate::utils::constants::{
    AUTH0_JWKS_CACHE, AUTH0_TOKEN_CACHE, JWKS_DOC, LAST_AUTH0_TOKEN_REQUEST, LAST_TOKEN_DATE_DOC, TOKEN_DOC,
};

const TOKEN_RECORD_NAME: &str = "AuthToken";
const JWKS_RECORD_NAME: &str = "AuthJwks";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedToken {
    #[serde(default)]
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastRequestMarker {
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JwksRecord {
    #[serde(default)]
    pub name: String,
    /// raw JWKS document as served by the provider
    pub jwks: String,
    pub created_at: DateTime<Utc>,
}

/// Token, rate-limit marker and JWKS persistence for one environment.
#[derive(Clone)]
pub struct TokenStore {
    documents: Arc<dyn DocumentStore>,
    environment: String,
    retry: RetrySettings,
}

impl TokenStore {
    pub fn new(documents: Arc<dyn DocumentStore>, environment: impl Into<String>, retry: RetrySettings) -> Self {
        Self {
            documents,
            environment: environment.into(),
            retry,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn token_index(&self) -> String {
        format!("{}{}", AUTH0_TOKEN_CACHE, self.environment)
    }

    pub fn last_request_index(&self) -> String {
        format!("{}{}", LAST_AUTH0_TOKEN_REQUEST, self.environment)
    }

    pub fn jwks_index(&self) -> String {
        format!("{}{}", AUTH0_JWKS_CACHE, self.environment)
    }

    /// `Ok(None)` when the index or the document does not exist yet.
    pub async fn cached_token(&self) -> Result<Option<CachedToken>, TokenError> {
        let cached: Option<CachedToken> = self.find_first(&self.token_index(), TOKEN_DOC).await?;
        Ok(cached.filter(|record| !record.token.is_empty()))
    }

    pub async fn save_token(&self, token: &str) -> Result<(), TokenError> {
        let record = CachedToken {
            name: TOKEN_RECORD_NAME.to_owned(),
            token: token.to_owned(),
            created_at: Some(now_utc()),
        };
        let index = self.token_index();
        self.documents
            .update_document(&index, TOKEN_DOC, &serde_json::to_value(&record)?)
            .await?;
        info!(index = %index, "auth token cached");
        Ok(())
    }

    pub async fn last_request(&self) -> Result<Option<DateTime<Utc>>, TokenError> {
        let marker: Option<LastRequestMarker> =
            self.find_first(&self.last_request_index(), LAST_TOKEN_DATE_DOC).await?;
        Ok(marker.map(|marker| marker.date))
    }

    pub async fn save_last_request(&self, at: DateTime<Utc>) -> Result<(), TokenError> {
        let index = self.last_request_index();
        let body = serde_json::to_value(LastRequestMarker { date: at })?;
        self.documents.create_document(&index, LAST_TOKEN_DATE_DOC, &body).await?;
        debug!(index = %index, date = %at, "last token request recorded");
        Ok(())
    }

    pub async fn cached_jwks(&self) -> Result<Option<JwksRecord>, TokenError> {
        self.find_first(&self.jwks_index(), JWKS_DOC).await
    }

    pub async fn save_jwks(&self, raw: &str) -> Result<(), TokenError> {
        let record = JwksRecord {
            name: JWKS_RECORD_NAME.to_owned(),
            jwks: raw.to_owned(),
            created_at: now_utc(),
        };
        let index = self.jwks_index();
        self.documents
            .update_document(&index, JWKS_DOC, &serde_json::to_value(&record)?)
            .await?;
        debug!(index = %index, "jwks cached");
        Ok(())
    }

    async fn find_first<T: DeserializeOwned>(&self, index: &str, id: &str) -> Result<Option<T>, TokenError> {
        let query: Value = term_id_query(id);
        let searched = self
            .retry
            .run_with_retry(|| self.documents.search(index, &query), is_retryable)
            .await;

        let body = match searched {
            Ok(body) => body,
            Err(TokenError::IndexNotFound(_)) => {
                debug!(index, "index does not exist yet");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let parsed: SearchResponse<T> = serde_json::from_slice(&body)?;
        Ok(parsed.into_first_source())
    }
}

fn is_retryable(err: &TokenError) -> bool {
    matches!(err, TokenError::Store(_) | TokenError::Transport(_))
}
