use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

use crate::types::job::{BaculaJob, Severity, job_type_label};
use crate::types::report::{ClientAnalysis, ErrorDetail, JobTypeCount, ReportData, ReportWindow};

/// Jobs whose best timestamp falls inside the window.
pub fn filter_to_window(jobs: &[BaculaJob], window: &ReportWindow) -> Vec<BaculaJob> {
    let offset = window.offset();
    jobs.iter()
        .filter(|job| {
            job.best_timestamp(offset)
                .is_some_and(|ts| window.contains(&ts))
        })
        .cloned()
        .collect()
}

/// Integer percentage, 0 when there is nothing to divide by.
pub fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 * 100.0) / whole as f64).round() as u32
}

#[derive(Default)]
struct ClientTally {
    total: usize,
    success: usize,
    errors: usize,
    warnings: usize,
    bytes: u64,
}

/// Counts, rates and breakdowns for already-filtered jobs.
///
/// Byte fields are left unformatted; see [`format_report_bytes`].
pub fn aggregate(jobs: &[BaculaJob], window: &ReportWindow, now: DateTime<Utc>) -> ReportData {
    let offset = window.offset();
    let mut report = ReportData {
        date: window.label(),
        window_start: window.start.to_rfc3339_opts(SecondsFormat::Secs, false),
        window_end: window.end.to_rfc3339_opts(SecondsFormat::Secs, false),
        generated_at: now.with_timezone(&offset).format("%d/%m/%Y %H:%M").to_string(),
        total_jobs: jobs.len(),
        ..ReportData::default()
    };

    let mut clients: HashMap<String, ClientTally> = HashMap::new();
    let mut types: HashMap<String, usize> = HashMap::new();

    for job in jobs {
        let status = job.status();
        let severity = status.severity();
        let tally = clients.entry(job.display_client().to_string()).or_default();
        tally.total += 1;
        tally.bytes += job.jobbytes;

        match severity {
            Severity::Critical => {
                report.error_jobs += 1;
                tally.errors += 1;
                report.error_details.push(ErrorDetail {
                    job_id: job.jobid.map(|id| id.to_string()).unwrap_or_default(),
                    job_name: job.display_name().to_string(),
                    client: job.display_client().to_string(),
                    status: status.code().to_string(),
                    status_label: status.label().to_string(),
                    level: job.level.clone().unwrap_or_default(),
                    job_type: job_type_label(job.job_type.as_deref().unwrap_or_default()),
                    time: job
                        .best_timestamp(offset)
                        .map(|ts| ts.format("%H:%M").to_string())
                        .unwrap_or_default(),
                    bytes: job.jobbytes,
                    bytes_formatted: String::new(),
                });
            }
            Severity::Warning => {
                report.warning_jobs += 1;
                tally.warnings += 1;
            }
            Severity::Info => {
                report.success_jobs += 1;
                tally.success += 1;
            }
            Severity::Unknown => report.unknown_jobs += 1,
        }

        report.total_bytes += job.jobbytes;
        report.total_files += job.jobfiles;
        *types
            .entry(job.job_type.clone().unwrap_or_default())
            .or_default() += 1;
    }

    report.error_rate = percentage(report.error_jobs, report.total_jobs);
    report.success_rate = percentage(report.success_jobs, report.total_jobs);

    report.clients = clients
        .into_iter()
        .map(|(client, t)| ClientAnalysis {
            client,
            total: t.total,
            success: t.success,
            errors: t.errors,
            warnings: t.warnings,
            success_rate: percentage(t.success, t.total),
            bytes: t.bytes,
            bytes_formatted: String::new(),
        })
        .collect();
    report
        .clients
        .sort_by(|a, b| b.errors.cmp(&a.errors).then_with(|| a.client.cmp(&b.client)));

    report.job_types = types
        .into_iter()
        .map(|(code, count)| JobTypeCount {
            label: job_type_label(&code),
            job_type: code,
            count,
        })
        .collect();
    report
        .job_types
        .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    report
}

/// Base-1024 size with up to two decimals, e.g. `1.5 GB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut exp = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exp < UNITS.len() - 1 {
        value /= 1024.0;
        exp += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exp])
}

/// Fill every `*_formatted` field of an aggregated report.
pub fn format_report_bytes(report: &mut ReportData) {
    report.total_bytes_formatted = format_bytes(report.total_bytes);
    for client in &mut report.clients {
        client.bytes_formatted = format_bytes(client.bytes);
    }
    for detail in &mut report.error_details {
        detail.bytes_formatted = format_bytes(detail.bytes);
    }
}
