use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::types::run::{Recipient, normalize_phone};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTemplate {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub content: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbScheduledReport {
    pub id: String,
    pub name: Option<String>,
    pub phone_number: String,
    pub template_id: String,
    pub schedule_time: Option<String>,
    pub is_active: bool,
}

impl From<DbScheduledReport> for Recipient {
    fn from(row: DbScheduledReport) -> Self {
        Recipient {
            scheduled_report_id: Some(row.id),
            name: row.name,
            phone_number: normalize_phone(&row.phone_number),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbIntegration {
    pub id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub instance_name: Option<String>,
    pub is_active: bool,
}

/// Outcome label stored with each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
    Unavailable,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
            RunStatus::Unavailable => "unavailable",
        }
    }

    pub fn from_counts(total: usize, succeeded: usize) -> Self {
        match succeeded {
            0 => RunStatus::Failed,
            n if n == total => RunStatus::Success,
            _ => RunStatus::Partial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRunLog {
    pub report_id: Option<String>,
    pub template_id: String,
    pub status: RunStatus,
    pub success: bool,
    pub recipients_total: usize,
    pub recipients_success: usize,
    pub execution_time_ms: u64,
    pub error_message: Option<String>,
    pub details: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbRunLog {
    pub id: i64,
    pub report_id: Option<String>,
    pub template_id: String,
    pub status: String,
    pub success: bool,
    pub recipients_total: i64,
    pub recipients_success: i64,
    pub execution_time_ms: i64,
    pub error_message: Option<String>,
    pub details: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_from_counts() {
        assert_eq!(RunStatus::from_counts(3, 3), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(3, 1), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(3, 0), RunStatus::Failed);
    }
}
