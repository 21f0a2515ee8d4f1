use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::debug;

use crate::auth0::dto::Claims;
use crate::auth0::jwks::JwksCache;
use crate::error::TokenError;
use crate::helpers::time::now_utc;
use crate::observability::metrics::get_metrics;

/// Verifies provider-issued RSA tokens against the cached key set.
#[derive(Clone)]
pub struct TokenValidator {
    jwks: Arc<JwksCache>,
}

impl TokenValidator {
    pub fn new(jwks: Arc<JwksCache>) -> Self {
        Self { jwks }
    }

    /// Signature checks out and `exp` lies in the future.
    pub async fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let result = self.verify(token).await;
        if let Err(e) = &result {
            debug!(error = %e, "token rejected");
            if e.is_validation_failure() {
                get_metrics()
                    .await
                    .validation_failures
                    .with_label_values(&[e.reason()])
                    .inc();
            }
        }
        result
    }

    pub async fn is_valid(&self, token: &str) -> bool {
        self.validate(token).await.is_ok()
    }

    async fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if !is_rsa(header.alg) {
            return Err(TokenError::UnexpectedSigningMethod(format!("{:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| TokenError::Malformed("token header has no kid".to_owned()))?;

        let key = self.jwks.decoding_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<Claims>(token, &key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        // the library accepts exp == now
        if claims.exp <= now_utc().timestamp() {
            return Err(TokenError::Validation("token is expired".to_owned()));
        }
        Ok(claims)
    }
}

fn is_rsa(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 | Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512
    )
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature | ErrorKind::InvalidSignature | ErrorKind::ImmatureSignature => {
            TokenError::Validation(err.to_string())
        }
        ErrorKind::InvalidAlgorithm => TokenError::UnexpectedSigningMethod(err.to_string()),
        _ => TokenError::Malformed(err.to_string()),
    }
}
