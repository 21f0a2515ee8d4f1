//! Configuration validation with aggregated errors.
//! Every issue is collected so a broken deployment reports all of them at once.

use tracing::{error, info};

use crate::config::services::{Auth0Config, ElasticConfig, ServiceConfig, SlackConfig};
use crate::config::settings::{RetryConfig, SettingsConfig};

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_auth0(&cfg.auth0, &mut errors);
    validate_elastic(&cfg.elastic, &mut errors);
    if let Some(slack) = &cfg.slack {
        validate_slack(slack, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    if settings.http.timeout_ms == 0 {
        errors.push("settings.http.timeout_ms must be > 0".to_string());
    }

    if let Some(server) = &settings.server {
        if server.host.is_empty() {
            errors.push("settings.server.host must not be empty".to_string());
        }
        if server.port.parse::<u16>().is_err() {
            errors.push(format!(
                "settings.server.port '{}' must be a valid port number",
                server.port
            ));
        }
    } else if settings.metrics.is_enabled {
        errors.push("settings.server is required when settings.metrics.is_enabled is true".to_string());
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
}

/// IDENTITY PROVIDER
fn validate_auth0(auth0: &Auth0Config, errors: &mut Vec<String>) {
    if auth0.environment.trim().is_empty() {
        errors.push("auth0.environment must not be empty".to_string());
    } else if auth0.environment.chars().any(|c| c.is_whitespace() || c.is_ascii_uppercase()) {
        // the environment becomes part of elasticsearch index names
        errors.push(format!(
            "auth0.environment '{}' must be lowercase without whitespace",
            auth0.environment
        ));
    }
    if auth0.grant_type.is_empty() {
        errors.push("auth0.grant_type must not be empty".to_string());
    }
    if auth0.client_id.is_empty() {
        errors.push("auth0.client_id must not be empty".to_string());
    }
    if auth0.client_secret.is_empty() {
        errors.push("auth0.client_secret must not be empty".to_string());
    }
    validate_url("auth0.url", &auth0.url, errors);

    if auth0.refresh_margin_seconds == 0 {
        errors.push("auth0.refresh_margin_seconds must be > 0".to_string());
    }
    if auth0.refresh_ahead_seconds < auth0.refresh_margin_seconds {
        errors.push(format!(
            "auth0.refresh_ahead_seconds ({}) must be >= refresh_margin_seconds ({})",
            auth0.refresh_ahead_seconds, auth0.refresh_margin_seconds
        ));
    }
}

fn validate_elastic(elastic: &ElasticConfig, errors: &mut Vec<String>) {
    validate_url("elastic.url", &elastic.url, errors);
    if elastic.password.is_some() && elastic.username.is_none() {
        errors.push("elastic.password requires elastic.username".to_string());
    }
}

fn validate_slack(slack: &SlackConfig, errors: &mut Vec<String>) {
    validate_url("slack.webhook_url", &slack.webhook_url, errors);
}

fn validate_url(path: &str, url: &str, errors: &mut Vec<String>) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{} '{}' must be an absolute http(s) url", path, url));
    }
}
