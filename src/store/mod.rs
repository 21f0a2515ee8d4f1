pub mod document;
pub mod elastic;
pub mod token_store;

pub use document::DocumentStore;
pub use elastic::ElasticStore;
pub use token_store::{CachedToken, JwksRecord, LastRequestMarker, TokenStore};
