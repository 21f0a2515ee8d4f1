//! Shared constants and invariants

/// A token may be requested from the provider at most once per window.
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60 * 60;
/// Cached provider keys are trusted for this long after they were fetched.
pub const JWKS_FRESHNESS_SECS: i64 = 30 * 60;
/// A kid still unknown after a re-fetch is not looked up again for this long.
pub const JWKS_MISSING_KID_RETRY_SECS: i64 = 60;

pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 5 * 60;
pub const DEFAULT_REFRESH_AHEAD_SECS: u64 = 60 * 60;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_GRANT_TYPE: &str = "client_credentials";

// Document store layout, suffixed with the environment name
pub const AUTH0_TOKEN_CACHE: &str = "auth0-token-cache-";
pub const LAST_AUTH0_TOKEN_REQUEST: &str = "last-auth0-token-request-";
pub const AUTH0_JWKS_CACHE: &str = "auth0-jwks-cache-";

pub const TOKEN_DOC: &str = "token";
pub const LAST_TOKEN_DATE_DOC: &str = "last-token-date";
pub const JWKS_DOC: &str = "jwks";

// Identity provider endpoints, relative to the configured auth url
pub const TOKEN_PATH: &str = "/oauth/token";
pub const JWKS_PATH: &str = "/oauth/.well-known/jwks.json";
