use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the token client and its collaborators.
#[derive(Debug, Error)]
pub enum TokenError {
    /// A token was requested from the provider less than an hour ago.
    #[error("can not request more than one token within the same hour (last request at {last_request})")]
    RateLimited { last_request: DateTime<Utc> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("document store error: {0}")]
    Store(String),

    #[error("index doesn't exist: {0}")]
    IndexNotFound(String),

    #[error("token is not valid: {0}")]
    Validation(String),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unexpected signing method: {0}")]
    UnexpectedSigningMethod(String),

    /// The signing key is missing from the provider key set even after a re-fetch.
    #[error("unable to find appropriate key: {0}")]
    KeyNotFound(String),

    #[error("created token is not valid")]
    InvalidGeneratedToken,

    #[error("could not unmarshal the data: {0}")]
    Unmarshal(#[from] serde_json::Error),

    #[error("notification error: {0}")]
    Notify(String),
}

impl TokenError {
    /// Validation failures mean "no usable token"; the caller should generate a new one.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            TokenError::Validation(_)
                | TokenError::Malformed(_)
                | TokenError::UnexpectedSigningMethod(_)
                | TokenError::KeyNotFound(_)
        )
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::RateLimited { .. } => "rate_limited",
            TokenError::Transport(_) => "transport",
            TokenError::Store(_) | TokenError::IndexNotFound(_) => "store",
            TokenError::Validation(_) => "validation",
            TokenError::Malformed(_) => "malformed",
            TokenError::UnexpectedSigningMethod(_) => "signing_method",
            TokenError::KeyNotFound(_) => "key_not_found",
            TokenError::InvalidGeneratedToken => "invalid_generated_token",
            TokenError::Unmarshal(_) => "unmarshal",
            TokenError::Notify(_) => "notify",
        }
    }
}

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        TokenError::Transport(err.to_string())
    }
}
