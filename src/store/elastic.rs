use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::services::ElasticConfig;
use crate::error::TokenError;
use crate::store::document::DocumentStore;

/// Elasticsearch REST adapter covering the three calls the token cache needs.
#[derive(Debug, Clone)]
pub struct ElasticStore {
    client: Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticStore {
    pub fn new(config: &ElasticConfig, timeout: Duration) -> Result<Self, TokenError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_owned(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => builder.basic_auth(username, self.password.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, index: &str) -> Result<Vec<u8>, TokenError> {
        let response = self.authorize(builder).send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        if status.is_success() {
            return Ok(body);
        }
        if status == StatusCode::NOT_FOUND && is_index_missing(&body) {
            return Err(TokenError::IndexNotFound(index.to_owned()));
        }
        Err(TokenError::Store(describe_error(status, &body)))
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn search(&self, index: &str, query: &Value) -> Result<Vec<u8>, TokenError> {
        debug!(index, "elastic search");
        let request = self
            .client
            .post(format!("{}/{}/_search", self.url, index))
            .json(query);
        self.send(request, index).await
    }

    async fn create_document(&self, index: &str, id: &str, body: &Value) -> Result<Vec<u8>, TokenError> {
        debug!(index, id, "elastic index document");
        let request = self
            .client
            .put(format!("{}/{}/_doc/{}", self.url, index, id))
            .query(&[("refresh", "true")])
            .json(body);
        self.send(request, index).await
    }

    async fn update_document(&self, index: &str, id: &str, body: &Value) -> Result<Vec<u8>, TokenError> {
        debug!(index, id, "elastic upsert document");
        let request = self
            .client
            .post(format!("{}/{}/_update/{}", self.url, index, id))
            .query(&[("refresh", "true")])
            .json(&json!({ "doc": body, "doc_as_upsert": true }));
        self.send(request, index).await
    }
}

/// A bare 404 on search means the index is missing; ES also tags it explicitly.
fn is_index_missing(body: &[u8]) -> bool {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value["error"]["type"]
            .as_str()
            .map(|kind| kind == "index_not_found_exception")
            .unwrap_or(true),
        Err(_) => true,
    }
}

fn describe_error(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) if value["error"].is_object() => format!(
            "[{}] {}: {}",
            status,
            value["error"]["type"].as_str().unwrap_or("unknown"),
            value["error"]["reason"].as_str().unwrap_or("unknown")
        ),
        _ => format!("[{}] {}", status, String::from_utf8_lossy(body)),
    }
}
