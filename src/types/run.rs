use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::report::ReportData;

/// Body accepted by the report trigger. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub report_id: Option<String>,
}

/// Someone a report is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub scheduled_report_id: Option<String>,
    pub name: Option<String>,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_report_id: Option<String>,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetails {
    pub template: String,
    pub test_mode: bool,
    pub recipients_total: usize,
    pub recipients_success: usize,
    pub recipients_failed: usize,
    pub execution_time_ms: u64,
    pub source_strategy: String,
    pub cache_hit: bool,
    pub report: ReportData,
}

/// Successful trigger response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<RunDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SendResult>>,
}

impl RunSummary {
    pub fn no_recipients(template: &str) -> Self {
        Self {
            success: true,
            message: format!("No active recipients for template {template}"),
            details: None,
            results: None,
        }
    }
}

/// Keeps only the digits of a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default_request() {
        let req: RunRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, RunRequest::default());
    }

    #[test]
    fn phone_numbers_are_reduced_to_digits() {
        assert_eq!(normalize_phone("+55 (11) 98765-4321"), "5511987654321");
    }
}
