use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::TokenError;

/// Minimal document store capability the token cache persists through.
///
/// Implementations report a missing index as [`TokenError::IndexNotFound`] so
/// callers can tell "never written" apart from "store unavailable".
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn search(&self, index: &str, query: &Value) -> Result<Vec<u8>, TokenError>;

    /// Create or replace the whole document.
    async fn create_document(&self, index: &str, id: &str, body: &Value) -> Result<Vec<u8>, TokenError>;

    /// Merge `body` into the document, creating it when absent.
    async fn update_document(&self, index: &str, id: &str, body: &Value) -> Result<Vec<u8>, TokenError>;
}

/// `{"size": 1, "query": {"term": {"_id": id}}}`
pub fn term_id_query(id: &str) -> Value {
    json!({
        "size": 1,
        "query": {
            "term": {
                "_id": id
            }
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse<T> {
    pub hits: Hits<T>,
}

#[derive(Debug, Deserialize)]
pub struct Hits<T> {
    #[serde(default = "Vec::new")]
    pub hits: Vec<Hit<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Hit<T> {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_source")]
    pub source: T,
}

impl<T> SearchResponse<T> {
    pub fn into_first_source(self) -> Option<T> {
        self.hits.hits.into_iter().next().map(|hit| hit.source)
    }
}
