use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::auth0::dto::{Claims, RefreshOutcome, TokenRequest};
use crate::auth0::generator::TokenGenerator;
use crate::auth0::jwks::JwksCache;
use crate::auth0::validator::TokenValidator;
use crate::config::services::{Auth0Config, ServiceConfig};
use crate::error::TokenError;
use crate::helpers::time::{now_utc, remaining_validity};
use crate::notify::{Alerter, NoopNotifier, Notifier, SlackNotifier};
use crate::observability::metrics::get_metrics;
use crate::resilience::retry::RetrySettings;
use crate::store::document::DocumentStore;
use crate::store::elastic::ElasticStore;
use crate::store::token_store::TokenStore;
use crate::transport::{HttpClient, ReqwestHttpClient};
use crate::utils::background::BackgroundTasks;
use crate::utils::constants::{JWKS_PATH, TOKEN_PATH};

/// Hands out a currently valid Auth0 bearer token, cache first.
///
/// Cheap to clone; clones share the store, the key cache and the background
/// dispatcher.
#[derive(Clone)]
pub struct TokenClient {
    inner: Arc<Inner>,
}

struct Inner {
    store: TokenStore,
    validator: TokenValidator,
    generator: TokenGenerator,
    alerter: Alerter,
    background: BackgroundTasks,
    refresh_margin: Duration,
    refresh_ahead: Duration,
    refreshing: AtomicBool,
}

impl TokenClient {
    pub fn new(
        config: &Auth0Config,
        http: Arc<dyn HttpClient>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        retry: RetrySettings,
    ) -> Self {
        let background = BackgroundTasks::new();
        let base_url = config.url.trim_end_matches('/');
        let store = TokenStore::new(documents, config.environment.clone(), retry);
        let alerter = Alerter::new(notifier, background.clone(), config.app_name.clone(), config.environment.clone());

        let jwks = JwksCache::new(http.clone(), store.clone(), format!("{}{}", base_url, JWKS_PATH));
        let validator = TokenValidator::new(Arc::new(jwks));
        let generator = TokenGenerator::new(
            http,
            store.clone(),
            validator.clone(),
            alerter.clone(),
            background.clone(),
            format!("{}{}", base_url, TOKEN_PATH),
            TokenRequest::from(config),
        );

        Self {
            inner: Arc::new(Inner {
                store,
                validator,
                generator,
                alerter,
                background,
                refresh_margin: seconds(config.refresh_margin_seconds),
                refresh_ahead: seconds(config.refresh_ahead_seconds),
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// Wire the reqwest, Elasticsearch and Slack adapters from configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, TokenError> {
        let timeout = StdDuration::from_millis(config.settings.http.timeout_ms);
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(timeout)?);
        let documents: Arc<dyn DocumentStore> = Arc::new(ElasticStore::new(&config.elastic, timeout)?);
        let notifier: Arc<dyn Notifier> = match &config.slack {
            Some(slack) => Arc::new(SlackNotifier::new(slack.clone(), timeout)?),
            None => Arc::new(NoopNotifier),
        };
        let retry = RetrySettings::from(config.settings.retry.as_ref());

        Ok(Self::new(&config.auth0, http, documents, notifier, retry))
    }

    /// Cached token when it still verifies, otherwise a freshly generated one.
    ///
    /// A cached token close to expiry is returned as is while a replacement is
    /// generated in the background.
    pub async fn get_token(&self) -> Result<String, TokenError> {
        let metrics = get_metrics().await;

        if let Some((token, claims)) = self.cached_valid_token().await {
            metrics.cache_hits.inc();
            metrics.token_expiry_unix.set(claims.exp);
            let remaining = remaining_validity(claims.exp, now_utc());
            if remaining < self.inner.refresh_margin {
                info!(remaining_secs = remaining.num_seconds(), "cached token close to expiry");
                self.schedule_refresh();
            }
            return Ok(token);
        }

        metrics.cache_misses.inc();
        self.generate_and_store().await
    }

    /// Periodic refresh: regenerate unless the cached token outlives the
    /// refresh-ahead window.
    pub async fn refresh_token(&self) -> Result<RefreshOutcome, TokenError> {
        if let Some((_, claims)) = self.cached_valid_token().await {
            let remaining = remaining_validity(claims.exp, now_utc());
            if remaining > self.inner.refresh_ahead {
                debug!(remaining_secs = remaining.num_seconds(), "token not expiring soon");
                return Ok(RefreshOutcome::NotExpiringSoon);
            }
        }

        self.generate_and_store().await?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// Best-effort work (marker writes, proactive refresh, alerts).
    pub fn background(&self) -> &BackgroundTasks {
        &self.inner.background
    }

    async fn cached_valid_token(&self) -> Option<(String, Claims)> {
        let cached = match self.inner.store.cached_token().await {
            Ok(Some(cached)) => cached,
            Ok(None) => {
                debug!(env = %self.inner.store.environment(), "no cached token");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "error getting cached token");
                get_metrics().await.store_failures.with_label_values(&["cached_token"]).inc();
                self.inner.alerter.alert("error getting cached token", &e);
                return None;
            }
        };

        match self.inner.validator.validate(&cached.token).await {
            Ok(claims) => Some((cached.token, claims)),
            Err(e) => {
                info!(error = %e, "cached token is not valid");
                None
            }
        }
    }

    async fn generate_and_store(&self) -> Result<String, TokenError> {
        let token = self.inner.generator.generate_token().await?;

        if let Err(e) = self.inner.store.save_token(&token).await {
            error!(error = %e, "could not cache the new token");
            get_metrics().await.store_failures.with_label_values(&["save_token"]).inc();
            self.inner.alerter.alert("error caching token", &e);
        }
        Ok(token)
    }

    /// At most one proactive refresh runs at a time.
    fn schedule_refresh(&self) {
        if self.inner.refreshing.swap(true, Ordering::AcqRel) {
            debug!("proactive refresh already in flight");
            return;
        }
        let client = self.clone();
        self.inner.background.spawn("proactive-refresh", async move {
            let _in_flight = InFlight(&client.inner.refreshing);
            match client.generate_and_store().await {
                Ok(_) => info!("token refreshed ahead of expiry"),
                Err(TokenError::RateLimited { last_request }) => {
                    debug!(%last_request, "proactive refresh skipped, rate limited")
                }
                Err(e) => warn!(error = %e, "proactive refresh failed"),
            }
        });
    }
}

/// Clears the refresh flag however the refresh task ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
