#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use bacula_reporter::config::Config;
use bacula_reporter::db::{DbIntegration, DbScheduledReport, DbTemplate, ReportStorage};
use bacula_reporter::router::{REPORT_PATH, ReporterState, reporter_router};
use bacula_reporter::service::runner::{BACULA_INTEGRATION, ReportRunner, WHATSAPP_INTEGRATION};
use bacula_reporter::types::report::ReportWindow;
use chrono::{Duration as ChronoDuration, FixedOffset, Utc};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use url::Url;
use wiremock::MockServer;

pub const TEMPLATE_ID: &str = "tpl-bacula-daily";
pub const INSTANCE: &str = "ops-instance";

pub struct Harness {
    pub app: Router,
    pub storage: ReportStorage,
    pub proxy: MockServer,
    pub sender: MockServer,
    db_path: PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn report_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).expect("valid offset")
}

/// Window the runner will report on if started now.
pub fn current_window() -> ReportWindow {
    ReportWindow::previous_day(Utc::now(), report_offset())
}

pub async fn harness(tag: &str, configure: impl FnOnce(&mut Config)) -> Harness {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut db_path = std::env::temp_dir();
    db_path.push(format!(
        "bacula-reporter-{tag}-{}-{nanos}.sqlite",
        std::process::id()
    ));

    let storage = ReportStorage::connect(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open storage");

    let proxy = MockServer::start().await;
    let sender = MockServer::start().await;

    let mut cfg = Config::default();
    cfg.bacula.proxy_url =
        Url::parse(&format!("{}/bacula-proxy", proxy.uri())).expect("proxy url");
    cfg.bacula.retry_base_delay_ms = 1;
    cfg.whatsapp.send_url =
        Url::parse(&format!("{}/send-message", sender.uri())).expect("send url");
    cfg.whatsapp.sends_per_minute = 6000;
    configure(&mut cfg);

    let runner = ReportRunner::from_config(storage.clone(), &cfg).expect("runner");
    let api_key = cfg.basic.api_key.as_deref().map(Arc::<str>::from);
    let app = reporter_router(ReporterState::new(runner, api_key));

    Harness {
        app,
        storage,
        proxy,
        sender,
        db_path,
    }
}

pub async fn seed_template(storage: &ReportStorage, content: &str) {
    storage
        .upsert_template(&DbTemplate {
            id: TEMPLATE_ID.to_string(),
            name: "bacula_daily_report".to_string(),
            category: Some("bacula".to_string()),
            content: content.to_string(),
            is_active: true,
        })
        .await
        .expect("seed template");
}

pub async fn seed_integrations(storage: &ReportStorage) {
    for (id, kind, instance) in [
        ("int-bacula", BACULA_INTEGRATION, None),
        ("int-evolution", WHATSAPP_INTEGRATION, Some(INSTANCE.to_string())),
    ] {
        storage
            .upsert_integration(&DbIntegration {
                id: id.to_string(),
                kind: kind.to_string(),
                name: kind.to_string(),
                base_url: Some("https://example.invalid".to_string()),
                api_token: None,
                username: None,
                password: None,
                instance_name: instance,
                is_active: true,
            })
            .await
            .expect("seed integration");
    }
}

pub async fn seed_recipients(storage: &ReportStorage, phones: &[&str]) {
    for (i, phone) in phones.iter().enumerate() {
        storage
            .insert_scheduled_report(&DbScheduledReport {
                id: format!("sched-{i}"),
                name: Some(format!("Operator {i}")),
                phone_number: phone.to_string(),
                template_id: TEMPLATE_ID.to_string(),
                schedule_time: Some("08:00".to_string()),
                is_active: true,
            })
            .await
            .expect("seed recipient");
    }
}

/// `ok` successful and `failed` critical jobs inside the current window,
/// plus one successful job three days earlier. Rows carry the overlapping
/// columns a real director returns (`job` beside `name`, `clientname`
/// beside `client`).
pub fn baculum_payload(ok: usize, failed: usize) -> Value {
    let window = current_window();
    let inside = (window.start + ChronoDuration::hours(12))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    let outside = (window.start - ChronoDuration::days(2))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let mut jobs = Vec::new();
    for i in 0..ok {
        jobs.push(json!({
            "jobid": i + 1, "job": format!("backup-{i}.{inside}"),
            "name": format!("backup-{i}"), "client": "fs01-fd", "clientname": "fs01-fd",
            "clientid": 1, "type": "B", "level": "I", "jobstatus": "T", "joberrors": 0,
            "jobbytes": "1048576", "jobfiles": "10", "starttime": inside,
        }));
    }
    for i in 0..failed {
        jobs.push(json!({
            "jobid": 100 + i, "job": format!("db-{i}.{inside}"),
            "name": format!("db-{i}"), "client": "db01-fd", "clientname": "db01-fd",
            "type": "B", "level": "F", "jobstatus": "E",
            "jobbytes": 0, "jobfiles": 0, "starttime": inside,
        }));
    }
    jobs.push(json!({
        "jobid": 999, "name": "old", "client": "fs01-fd", "type": "B",
        "jobstatus": "T", "starttime": outside,
    }));

    json!({ "output": jobs, "error": 0 })
}

pub fn trigger(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(REPORT_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, value)
}
