use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Instant;

use crate::db::models::DbRunLog;
use crate::error::ReporterError;
use crate::middleware::auth::RequireKeyAuth;
use crate::middleware::report_request::ReportTrigger;
use crate::router::ReporterState;

/// POST trigger for the daily Bacula report.
pub async fn bacula_daily_report_handler(
    State(state): State<ReporterState>,
    _auth: RequireKeyAuth,
    ReportTrigger(req): ReportTrigger,
) -> Response {
    let started = Instant::now();
    match state.runner.run(req).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => {
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            err.with_elapsed(elapsed).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
}

const DEFAULT_LOG_LIMIT: u32 = 20;
const MAX_LOG_LIMIT: u32 = 200;

/// GET recent run history, newest first.
pub async fn report_logs_handler(
    State(state): State<ReporterState>,
    _auth: RequireKeyAuth,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<DbRunLog>>, ReporterError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let logs = state.runner.storage().recent_run_logs(limit).await?;
    Ok(Json(logs))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
