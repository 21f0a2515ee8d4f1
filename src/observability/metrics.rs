use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token cache
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub token_expiry_unix: IntGauge,

    // Token generation
    pub generation_requests: IntCounter,
    pub rate_limited: IntCounter,
    pub generation_failures: IntCounterVec,

    // Validation
    pub jwks_fetches: IntCounter,
    pub validation_failures: IntCounterVec,

    // Document store
    pub store_failures: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    // metric names and labels are constants, so construction and registration
    // only fail on a programming error
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("auth0token".into()), None).expect("valid registry prefix");

        let metrics = Arc::new(Self {
            cache_hits: IntCounter::new("cache_hits_total", "get_token calls served from the cache").expect("metric"),
            cache_misses: IntCounter::new("cache_misses_total", "get_token calls without a usable cached token").expect("metric"),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the last served token").expect("metric"),

            generation_requests: IntCounter::new("generation_requests_total", "Token endpoint calls").expect("metric"),
            rate_limited: IntCounter::new("generation_rate_limited_total", "Generations rejected by the hourly limit").expect("metric"),
            generation_failures: IntCounterVec::new(Opts::new("generation_failures_total", "Failed generations by reason"), &["reason"]).expect("metric"),

            jwks_fetches: IntCounter::new("jwks_fetches_total", "JWKS endpoint calls").expect("metric"),
            validation_failures: IntCounterVec::new(Opts::new("validation_failures_total", "Rejected tokens by reason"), &["reason"]).expect("metric"),

            store_failures: IntCounterVec::new(Opts::new("store_failures_total", "Document store failures by operation"), &["operation"]).expect("metric"),

            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").expect("metric"),
            up: IntGauge::new("up", "1 if service is healthy").expect("metric"),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.cache_hits.clone())).expect("register");
        reg.register(Box::new(metrics.cache_misses.clone())).expect("register");
        reg.register(Box::new(metrics.token_expiry_unix.clone())).expect("register");
        reg.register(Box::new(metrics.generation_requests.clone())).expect("register");
        reg.register(Box::new(metrics.rate_limited.clone())).expect("register");
        reg.register(Box::new(metrics.generation_failures.clone())).expect("register");
        reg.register(Box::new(metrics.jwks_fetches.clone())).expect("register");
        reg.register(Box::new(metrics.validation_failures.clone())).expect("register");
        reg.register(Box::new(metrics.store_failures.clone())).expect("register");
        reg.register(Box::new(metrics.config_validation_errors.clone())).expect("register");
        reg.register(Box::new(metrics.up.clone())).expect("register");

        metrics
    }
}
