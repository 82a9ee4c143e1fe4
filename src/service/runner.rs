use chrono::{DateTime, FixedOffset, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::api::bacula_api::BaculaApi;
use crate::api::whatsapp_api::WhatsAppApi;
use crate::config::Config;
use crate::db::models::{DbTemplate, NewRunLog, RunStatus};
use crate::db::sqlite::ReportStorage;
use crate::error::ReporterError;
use crate::service::aggregator::{aggregate, filter_to_window, format_report_bytes};
use crate::service::job_cache::JobCache;
use crate::service::template;
use crate::types::job::BaculaJob;
use crate::types::report::ReportWindow;
use crate::types::run::{Recipient, RunDetails, RunRequest, RunSummary, SendResult, normalize_phone};

pub const BACULA_INTEGRATION: &str = "bacula";
pub const WHATSAPP_INTEGRATION: &str = "evolution_api";

const TEST_BANNER: &str = "🧪 *TEST MESSAGE*\n\n";

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub template_name: String,
    pub fallback_token: String,
    pub utc_offset: FixedOffset,
}

impl RunnerSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ReporterError> {
        let hours = cfg.bacula.utc_offset_hours;
        let utc_offset = FixedOffset::east_opt(hours * 3600).ok_or_else(|| {
            ReporterError::Config(format!("utc_offset_hours out of range: {hours}"))
        })?;
        Ok(Self {
            template_name: cfg.report.template_name.clone(),
            fallback_token: cfg.report.fallback_token.clone(),
            utc_offset,
        })
    }
}

/// Where the run's jobs came from.
struct SourceJobs {
    strategy: &'static str,
    cache_hit: bool,
    jobs: Arc<Vec<BaculaJob>>,
}

/// The daily report pipeline: resolve, fetch, aggregate, render, notify, record.
#[derive(Clone)]
pub struct ReportRunner {
    storage: ReportStorage,
    bacula: BaculaApi,
    whatsapp: WhatsAppApi,
    cache: JobCache,
    settings: Arc<RunnerSettings>,
}

impl ReportRunner {
    pub fn new(
        storage: ReportStorage,
        bacula: BaculaApi,
        whatsapp: WhatsAppApi,
        cache: JobCache,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            storage,
            bacula,
            whatsapp,
            cache,
            settings: Arc::new(settings),
        }
    }

    pub fn from_config(storage: ReportStorage, cfg: &Config) -> Result<Self, ReporterError> {
        Ok(Self::new(
            storage,
            BaculaApi::new(&cfg.bacula)?,
            WhatsAppApi::new(&cfg.whatsapp)?,
            JobCache::new(cfg.bacula.cache_ttl()),
            RunnerSettings::from_config(cfg)?,
        ))
    }

    pub fn storage(&self) -> &ReportStorage {
        &self.storage
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub async fn run(&self, req: RunRequest) -> Result<RunSummary, ReporterError> {
        self.run_at(req, Utc::now()).await
    }

    /// Run as if the current time were `now`; the report covers the day
    /// before `now` in the configured offset.
    pub async fn run_at(
        &self,
        req: RunRequest,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, ReporterError> {
        let started = Instant::now();
        let started_at = Utc::now();

        let template = self.resolve_template(req.report_id.as_deref()).await?;
        let recipients = self.resolve_recipients(&req, &template).await?;
        if recipients.is_empty() {
            info!(template = %template.name, "no active recipients; nothing to send");
            return Ok(RunSummary::no_recipients(&template.name));
        }

        self.require_integration(BACULA_INTEGRATION).await?;
        let instance_name = self.whatsapp_instance().await?;

        let window = ReportWindow::previous_day(now, self.settings.utc_offset);
        info!(
            template = %template.name,
            recipients = recipients.len(),
            test_mode = req.test_mode,
            window = %window.key(),
            "starting bacula daily report"
        );

        let source = match self.load_jobs(&window).await {
            Ok(source) => source,
            Err(err) => {
                warn!(error = %err, "bacula data unavailable; alerting recipients");
                let alert = unavailable_alert(&window, &err);
                let results = self
                    .whatsapp
                    .broadcast(&instance_name, &recipients, &alert)
                    .await;
                let log = NewRunLog {
                    report_id: req.report_id.clone(),
                    template_id: template.id.clone(),
                    status: RunStatus::Unavailable,
                    success: false,
                    recipients_total: recipients.len(),
                    recipients_success: results.iter().filter(|r| r.success).count(),
                    execution_time_ms: elapsed_ms(started),
                    error_message: Some(err.to_string()),
                    details: json!({ "test_mode": req.test_mode, "alert_results": results }),
                    started_at,
                    finished_at: Utc::now(),
                };
                self.record(&log).await;
                return Err(err);
            }
        };

        let filtered = filter_to_window(&source.jobs, &window);
        let mut report = aggregate(&filtered, &window, now);
        format_report_bytes(&mut report);

        let mut message =
            template::render(&template.content, &report, &self.settings.fallback_token);
        if req.test_mode {
            message.insert_str(0, TEST_BANNER);
        }

        let results = self
            .whatsapp
            .broadcast(&instance_name, &recipients, &message)
            .await;
        let recipients_success = results.iter().filter(|r| r.success).count();
        let recipients_total = recipients.len();
        let execution_time_ms = elapsed_ms(started);

        info!(
            fetched = source.jobs.len(),
            in_window = report.total_jobs,
            errors = report.error_jobs,
            sent = recipients_success,
            failed = recipients_total - recipients_success,
            execution_time_ms,
            "bacula daily report finished"
        );

        let log = NewRunLog {
            report_id: req.report_id.clone(),
            template_id: template.id.clone(),
            status: RunStatus::from_counts(recipients_total, recipients_success),
            success: recipients_success > 0,
            recipients_total,
            recipients_success,
            execution_time_ms,
            error_message: failure_summary(&results),
            details: json!({
                "test_mode": req.test_mode,
                "source_strategy": source.strategy,
                "cache_hit": source.cache_hit,
                "total_jobs": report.total_jobs,
                "error_jobs": report.error_jobs,
                "results": results,
            }),
            started_at,
            finished_at: Utc::now(),
        };
        self.record(&log).await;

        Ok(RunSummary {
            success: recipients_success > 0,
            message: format!(
                "Report sent to {recipients_success} of {recipients_total} recipients"
            ),
            details: Some(RunDetails {
                template: template.name,
                test_mode: req.test_mode,
                recipients_total,
                recipients_success,
                recipients_failed: recipients_total - recipients_success,
                execution_time_ms,
                source_strategy: source.strategy.to_string(),
                cache_hit: source.cache_hit,
                report,
            }),
            results: Some(results),
        })
    }

    async fn resolve_template(&self, report_id: Option<&str>) -> Result<DbTemplate, ReporterError> {
        let (lookup, template) = match report_id {
            Some(id) => (id, self.storage.template_by_id(id).await?),
            None => {
                let name = self.settings.template_name.as_str();
                (name, self.storage.template_by_name(name).await?)
            }
        };
        let template = template.ok_or_else(|| ReporterError::TemplateNotFound(lookup.to_string()))?;
        if !template.is_active {
            return Err(ReporterError::TemplateInactive(template.name));
        }
        Ok(template)
    }

    async fn resolve_recipients(
        &self,
        req: &RunRequest,
        template: &DbTemplate,
    ) -> Result<Vec<Recipient>, ReporterError> {
        if req.test_mode {
            let phone = req
                .phone_number
                .as_deref()
                .map(normalize_phone)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ReporterError::InvalidRequest("phone_number is required in test mode".into())
                })?;
            return Ok(vec![Recipient {
                scheduled_report_id: None,
                name: None,
                phone_number: phone,
            }]);
        }

        Ok(self
            .storage
            .active_recipients(&template.id)
            .await?
            .into_iter()
            .map(Recipient::from)
            .filter(|r| !r.phone_number.is_empty())
            .collect())
    }

    async fn require_integration(&self, kind: &str) -> Result<(), ReporterError> {
        self.storage
            .active_integration(kind)
            .await?
            .map(|_| ())
            .ok_or_else(|| ReporterError::IntegrationMissing(kind.to_string()))
    }

    async fn whatsapp_instance(&self) -> Result<String, ReporterError> {
        self.storage
            .active_integration(WHATSAPP_INTEGRATION)
            .await?
            .and_then(|row| row.instance_name)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ReporterError::IntegrationMissing(WHATSAPP_INTEGRATION.to_string()))
    }

    async fn load_jobs(&self, window: &ReportWindow) -> Result<SourceJobs, ReporterError> {
        let key = window.key();
        if let Some((strategy, jobs)) = self.cache.get(&key) {
            info!(key = %key, count = jobs.len(), "bacula jobs served from cache");
            return Ok(SourceJobs {
                strategy,
                cache_hit: true,
                jobs,
            });
        }

        let fetched = self.bacula.fetch_first(window).await?;
        let jobs = self.cache.insert(key, fetched.strategy, fetched.jobs);
        debug!(cached_windows = self.cache.len(), "bacula jobs cached");
        Ok(SourceJobs {
            strategy: fetched.strategy,
            cache_hit: false,
            jobs,
        })
    }

    /// Write the run log; a failure here never fails the run.
    async fn record(&self, log: &NewRunLog) {
        if let Err(e) = self.storage.insert_run_log(log).await {
            warn!(error = %e, template_id = %log.template_id, "failed to write run log");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn failure_summary(results: &[SendResult]) -> Option<String> {
    let failed: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| {
            format!(
                "{}: {}",
                r.phone_number,
                r.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    (!failed.is_empty()).then(|| failed.join("; "))
}

fn unavailable_alert(window: &ReportWindow, err: &ReporterError) -> String {
    format!(
        "⚠️ *Bacula daily report unavailable*\n\n\
         The backup report for {} could not be generated because the Bacula \
         server did not answer.\n\nDetails: {}\n\nPlease check the Bacula \
         director and the proxy function.",
        window.label(),
        err
    )
}
