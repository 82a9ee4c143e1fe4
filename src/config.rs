use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::error::ReporterError;

/// Process-wide configuration, resolved once at first access.
///
/// Only `main` should read this; components take their own section by value
/// so tests can build them from `Config::default()`.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("invalid reporter configuration"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub bacula: BaculaConfig,
    pub whatsapp: WhatsAppConfig,
    pub report: ReportConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Defaults, then `config.toml`, then `REPORTER_*` environment variables.
    pub fn load() -> Result<Self, ReporterError> {
        Self::figment().extract().map_err(|e| ReporterError::Config(e.to_string()))
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("REPORTER_").split("__"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Shared key for the report routes. Unset means open access.
    pub api_key: Option<String>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:reporter.db".to_string(),
            loglevel: "info".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaculaConfig {
    pub proxy_url: Url,
    pub service_key: Option<String>,
    pub retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub cache_ttl_secs: u64,
    pub utc_offset_hours: i32,
    pub request_timeout_secs: u64,
}

impl BaculaConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for BaculaConfig {
    fn default() -> Self {
        Self {
            proxy_url: Url::parse("http://127.0.0.1:54321/functions/v1/bacula-proxy")
                .expect("static bacula proxy url"),
            service_key: None,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            cache_ttl_secs: 600,
            utc_offset_hours: -3,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub send_url: Url,
    pub service_key: Option<String>,
    pub sends_per_minute: u32,
    pub request_timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            send_url: Url::parse("http://127.0.0.1:54321/functions/v1/evolution-send-message")
                .expect("static send-message url"),
            service_key: None,
            sends_per_minute: 30,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub template_name: String,
    pub fallback_token: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            template_name: "bacula_daily_report".to_string(),
            fallback_token: "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// `HH:MM` in the report offset.
    pub daily_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            daily_at: "08:00".to_string(),
        }
    }
}
