use serde::Deserialize;
use std::fmt;

use crate::config::settings::SettingsConfig;
use crate::utils::constants::{DEFAULT_GRANT_TYPE, DEFAULT_REFRESH_AHEAD_SECS, DEFAULT_REFRESH_MARGIN_SECS};


/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub auth0: Auth0Config,
    pub elastic: ElasticConfig,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
}

/// ================================
/// Identity provider
/// ================================
#[derive(Deserialize, Clone)]
pub struct Auth0Config {
    /// suffix of every index the client touches
    pub environment: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    /// base url, e.g. https://tenant.auth0.com
    pub url: String,
    /// get_token schedules a background refresh below this remaining lifetime
    #[serde(default = "default_refresh_margin_seconds")]
    pub refresh_margin_seconds: u64,
    /// refresh_token regenerates below this remaining lifetime
    #[serde(default = "default_refresh_ahead_seconds")]
    pub refresh_ahead_seconds: u64,
}

impl fmt::Debug for Auth0Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth0Config")
            .field("environment", &self.environment)
            .field("app_name", &self.app_name)
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("audience", &self.audience)
            .field("url", &self.url)
            .field("refresh_margin_seconds", &self.refresh_margin_seconds)
            .field("refresh_ahead_seconds", &self.refresh_ahead_seconds)
            .finish()
    }
}

/// ================================
/// Document store
/// ================================
#[derive(Deserialize, Clone)]
pub struct ElasticConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ElasticConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// ================================
/// Alerting
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: Option<String>,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
}

fn default_app_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_grant_type() -> String {
    DEFAULT_GRANT_TYPE.to_string()
}

fn default_refresh_margin_seconds() -> u64 {
    DEFAULT_REFRESH_MARGIN_SECS
}

fn default_refresh_ahead_seconds() -> u64 {
    DEFAULT_REFRESH_AHEAD_SECS
}
