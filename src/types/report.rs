use chrono::{DateTime, Days, FixedOffset, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

/// Half-open reporting window `[start, end)`: the calendar day before `now`
/// in a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl ReportWindow {
    pub fn previous_day(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let today = now.with_timezone(&offset).date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let start = offset
            .from_local_datetime(&yesterday.and_time(NaiveTime::MIN))
            .single()
            .unwrap_or_else(|| now.with_timezone(&offset));
        let end = offset
            .from_local_datetime(&today.and_time(NaiveTime::MIN))
            .single()
            .unwrap_or_else(|| now.with_timezone(&offset));
        Self { start, end }
    }

    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        *ts >= self.start && *ts < self.end
    }

    pub fn offset(&self) -> FixedOffset {
        *self.start.offset()
    }

    /// Cache key for this window.
    pub fn key(&self) -> String {
        format!(
            "{}_{}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, false),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, false)
        )
    }

    /// Human date of the reported day, `DD/MM/YYYY`.
    pub fn label(&self) -> String {
        self.start.format("%d/%m/%Y").to_string()
    }
}

/// Aggregated figures for one reporting window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportData {
    pub date: String,
    pub window_start: String,
    pub window_end: String,
    pub generated_at: String,
    pub total_jobs: usize,
    pub error_jobs: usize,
    pub success_jobs: usize,
    pub warning_jobs: usize,
    pub unknown_jobs: usize,
    pub error_rate: u32,
    pub success_rate: u32,
    pub total_bytes: u64,
    pub total_files: u64,
    /// Filled by `format_bytes` after aggregation.
    pub total_bytes_formatted: String,
    pub clients: Vec<ClientAnalysis>,
    pub job_types: Vec<JobTypeCount>,
    pub error_details: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientAnalysis {
    pub client: String,
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub warnings: usize,
    pub success_rate: u32,
    pub bytes: u64,
    pub bytes_formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobTypeCount {
    pub job_type: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub job_id: String,
    pub job_name: String,
    pub client: String,
    pub status: String,
    pub status_label: String,
    pub level: String,
    pub job_type: String,
    pub time: String,
    pub bytes: u64,
    pub bytes_formatted: String,
}
