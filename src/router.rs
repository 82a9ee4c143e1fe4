use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::report::{bacula_daily_report_handler, health_handler, report_logs_handler};
use crate::service::runner::ReportRunner;

pub const REPORT_PATH: &str = "/functions/v1/bacula-daily-report";
pub const REPORT_LOGS_PATH: &str = "/functions/v1/bacula-daily-report/logs";

const TRIGGER_BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct ReporterState {
    pub runner: ReportRunner,
    pub api_key: Option<Arc<str>>,
}

impl ReporterState {
    pub fn new(runner: ReportRunner, api_key: Option<Arc<str>>) -> Self {
        Self { runner, api_key }
    }
}

pub fn reporter_router(state: ReporterState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(
            REPORT_PATH,
            post(bacula_daily_report_handler).layer(DefaultBodyLimit::max(TRIGGER_BODY_LIMIT)),
        )
        .route(REPORT_LOGS_PATH, get(report_logs_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
