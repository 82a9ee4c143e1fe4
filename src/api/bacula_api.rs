use backon::Retryable;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::backoff::LinearBuilder;
use crate::config::BaculaConfig;
use crate::error::{IsRetryable, ReporterError};
use crate::service::normalizer;
use crate::types::job::BaculaJob;
use crate::types::report::ReportWindow;

/// One way of asking the proxy for the day's jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchStrategy {
    #[serde(skip)]
    pub name: &'static str,
    pub endpoint: &'static str,
    pub params: Value,
}

/// Strategies in the order they are tried.
pub fn strategies(window: &ReportWindow) -> Vec<FetchStrategy> {
    const FMT: &str = "%Y-%m-%d %H:%M:%S";
    vec![
        FetchStrategy {
            name: "jobs_window",
            endpoint: "jobs",
            params: json!({
                "starttime_from": window.start.format(FMT).to_string(),
                "starttime_to": window.end.format(FMT).to_string(),
            }),
        },
        FetchStrategy {
            name: "jobs_last_48h",
            endpoint: "jobs",
            params: json!({ "age": 172_800 }),
        },
        FetchStrategy {
            name: "jobs_recent",
            endpoint: "jobs",
            params: json!({ "limit": 1000 }),
        },
    ]
}

/// Jobs returned by the first strategy that succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedJobs {
    pub strategy: &'static str,
    pub jobs: Vec<BaculaJob>,
}

/// Client for the Bacula proxy function.
#[derive(Clone)]
pub struct BaculaApi {
    client: reqwest::Client,
    proxy_url: Url,
    service_key: Option<String>,
    retry: LinearBuilder,
}

impl BaculaApi {
    pub fn new(cfg: &BaculaConfig) -> Result<Self, ReporterError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bacula-reporter/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            proxy_url: cfg.proxy_url.clone(),
            service_key: cfg.service_key.clone(),
            retry: LinearBuilder::new(cfg.retry_base_delay(), cfg.retry_attempts.max(1)),
        })
    }

    async fn post_once(&self, strategy: &FetchStrategy) -> Result<Vec<BaculaJob>, ReporterError> {
        let mut req = self.client.post(self.proxy_url.clone()).json(strategy);
        if let Some(key) = self.service_key.as_deref() {
            req = req.bearer_auth(key).header("apikey", key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ReporterError::UpstreamStatus(status));
        }
        let payload: Value = resp.json().await?;
        normalizer::parse_jobs(&payload)
    }

    /// One strategy with linear-backoff retries.
    pub async fn fetch_with_retry(
        &self,
        strategy: &FetchStrategy,
    ) -> Result<Vec<BaculaJob>, ReporterError> {
        (|| async { self.post_once(strategy).await })
            .retry(self.retry)
            .when(|e: &ReporterError| e.is_retryable())
            .notify(|err: &ReporterError, dur: Duration| {
                warn!(
                    strategy = strategy.name,
                    error = %err,
                    "bacula proxy call failed; retrying in {:?}",
                    dur
                );
            })
            .await
    }

    /// Try every strategy in order; the first that yields data wins.
    pub async fn fetch_first(&self, window: &ReportWindow) -> Result<FetchedJobs, ReporterError> {
        let strategies = strategies(window);
        let count = strategies.len();
        let mut last_error = String::from("no strategy attempted");

        for strategy in &strategies {
            debug!(strategy = strategy.name, params = %strategy.params, "fetching bacula jobs");
            match self.fetch_with_retry(strategy).await {
                Ok(jobs) => {
                    info!(strategy = strategy.name, count = jobs.len(), "bacula jobs fetched");
                    return Ok(FetchedJobs {
                        strategy: strategy.name,
                        jobs,
                    });
                }
                Err(e) => {
                    warn!(strategy = strategy.name, error = %e, "bacula strategy exhausted");
                    last_error = e.to_string();
                }
            }
        }

        Err(ReporterError::SourceUnavailable {
            strategies: count,
            last_error,
        })
    }
}
