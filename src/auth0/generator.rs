use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};

use crate::auth0::dto::{TokenRequest, TokenResponse};
use crate::auth0::validator::TokenValidator;
use crate::error::TokenError;
use crate::helpers::time::{is_within_window, now_utc};
use crate::notify::Alerter;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::store::token_store::TokenStore;
use crate::transport::{HttpClient, HttpRequest};
use crate::utils::background::BackgroundTasks;
use crate::utils::constants::RATE_LIMIT_WINDOW_SECS;

/// Client-credentials token generation, at most once per hour per environment.
#[derive(Clone)]
pub struct TokenGenerator {
    http: Arc<dyn HttpClient>,
    store: TokenStore,
    validator: TokenValidator,
    alerter: Alerter,
    background: BackgroundTasks,
    token_url: String,
    request: TokenRequest,
}

impl TokenGenerator {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: TokenStore,
        validator: TokenValidator,
        alerter: Alerter,
        background: BackgroundTasks,
        token_url: impl Into<String>,
        request: TokenRequest,
    ) -> Self {
        Self {
            http,
            store,
            validator,
            alerter,
            background,
            token_url: token_url.into(),
            request,
        }
    }

    pub async fn generate_token(&self) -> Result<String, TokenError> {
        let metrics = get_metrics().await;

        let now = now_utc();
        if let Some(last_request) = self.store.last_request().await? {
            if is_within_window(last_request, Duration::seconds(RATE_LIMIT_WINDOW_SECS), now) {
                warn!(env = %self.store.environment(), %last_request, "token generation rate limited");
                metrics.rate_limited.inc();
                return Err(TokenError::RateLimited { last_request });
            }
        }

        info!(env = %self.store.environment(), "requesting a new auth0 token");
        metrics.generation_requests.inc();
        let sent = self
            .http
            .request(HttpRequest::post_json(&self.token_url, &self.request)?)
            .await;

        // the marker guards the window whatever the provider answered
        let store = self.store.clone();
        self.background.spawn("last-token-request", async move {
            if let Err(e) = store.save_last_request(now).await {
                error!(error = %e, "could not record last token request");
            }
        });

        let response = match sent {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                let err = TokenError::Transport(format!(
                    "token endpoint responded {}: {}",
                    response.status,
                    response.text()
                ));
                return Err(self.failed(metrics, "error generating a new token", err));
            }
            Err(err) => return Err(self.failed(metrics, "error generating a new token", err)),
        };

        let body: TokenResponse = response
            .json()
            .map_err(|err| self.failed(metrics, "could not parse token response", err))?;

        match self.validator.validate(&body.access_token).await {
            Ok(_) => Ok(body.access_token),
            Err(err) if err.is_validation_failure() => {
                self.alerter.alert("created token is not valid", &err);
                Err(record_failure(metrics, TokenError::InvalidGeneratedToken))
            }
            Err(err) => Err(self.failed(metrics, "could not validate created token", err)),
        }
    }

    fn failed(&self, metrics: &Metrics, context: &str, err: TokenError) -> TokenError {
        error!(error = %err, "{}", context);
        self.alerter.alert(context, &err);
        record_failure(metrics, err)
    }
}

fn record_failure(metrics: &Metrics, err: TokenError) -> TokenError {
    metrics.generation_failures.with_label_values(&[err.reason()]).inc();
    err
}
