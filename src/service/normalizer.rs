//! Turns a Bacula proxy payload into typed jobs.
//!
//! The documented Baculum envelope is `{"output": [...], "error": 0}`. Older
//! proxy deployments answered with other shapes; `legacy_job_list` keeps
//! reading those until every deployment is on the envelope, and logs each
//! time it is needed.

use serde_json::Value;
use tracing::warn;

use crate::error::ReporterError;
use crate::types::job::BaculaJob;

/// Error marker inside a payload: absent, `null`, `0` and `false` mean none.
pub fn payload_error(payload: &Value) -> Option<String> {
    match payload.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_i64() == Some(0) => None,
        Value::String(s) if s.is_empty() => None,
        other => {
            let detail = payload
                .get("output")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string());
            Some(detail)
        }
    }
}

/// Extract and decode the job list.
pub fn parse_jobs(payload: &Value) -> Result<Vec<BaculaJob>, ReporterError> {
    if let Some(message) = payload_error(payload) {
        return Err(ReporterError::UpstreamPayload(message));
    }

    let items = match payload.get("output").and_then(Value::as_array) {
        Some(items) => items,
        None => {
            let items = legacy_job_list(payload).ok_or(ReporterError::UnrecognizedPayload)?;
            warn!(
                count = items.len(),
                "bacula payload not in documented envelope; read via legacy shape"
            );
            items
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            serde_json::from_value::<BaculaJob>(item.clone())
                .inspect_err(|e| warn!(error = %e, "skipping undecodable bacula job"))
                .ok()
        })
        .collect())
}

fn legacy_job_list(payload: &Value) -> Option<&Vec<Value>> {
    if let Some(items) = payload.as_array() {
        return Some(items);
    }
    let obj = payload.as_object()?;

    for key in ["jobs", "output"] {
        if let Some(items) = obj.get(key).and_then(Value::as_array) {
            return Some(items);
        }
    }

    if let Some(data) = obj.get("data") {
        if let Some(items) = data.as_array() {
            return Some(items);
        }
        if data.is_object()
            && let Some(items) = nested_job_list(data)
        {
            return Some(items);
        }
    }

    if let Some(items) = obj.get("result").and_then(Value::as_array) {
        return Some(items);
    }

    obj.values().find_map(Value::as_array)
}

fn nested_job_list(data: &Value) -> Option<&Vec<Value>> {
    let obj = data.as_object()?;
    ["output", "jobs", "result"]
        .into_iter()
        .find_map(|key| obj.get(key).and_then(Value::as_array))
        .or_else(|| obj.values().find_map(Value::as_array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(jobs: &[BaculaJob]) -> Vec<&str> {
        jobs.iter().map(BaculaJob::display_name).collect()
    }

    #[test]
    fn reads_documented_envelope() {
        let payload = json!({"output": [{"name": "a"}, {"name": "b"}], "error": 0});
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(names(&jobs), ["a", "b"]);
    }

    #[test]
    fn director_rows_with_job_and_name_are_kept() {
        let payload = json!({
            "output": [{
                "jobid": 1,
                "job": "BackupClient1.2026-10-16_23.05.00_03",
                "name": "BackupClient1",
                "type": "B",
                "clientid": 1,
                "client": "fd01",
                "clientname": "fd01",
                "jobstatus": "T",
                "starttime": "2026-10-16 23:05:02",
                "jobbytes": 1024,
                "jobfiles": 3
            }],
            "error": 0
        });
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(names(&jobs), ["BackupClient1"]);
        assert_eq!(jobs[0].display_client(), "fd01");
    }

    #[test]
    fn empty_envelope_is_data() {
        let jobs = parse_jobs(&json!({"output": [], "error": 0})).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn error_flag_rejects_payload() {
        let err = parse_jobs(&json!({"output": "Director unreachable", "error": 6})).unwrap_err();
        assert!(matches!(err, ReporterError::UpstreamPayload(m) if m == "Director unreachable"));
    }

    #[test]
    fn legacy_shapes_are_probed_in_order() {
        let cases = [
            json!([{"name": "top"}]),
            json!({"jobs": [{"name": "jobs"}]}),
            json!({"data": [{"name": "data"}]}),
            json!({"data": {"output": [{"name": "nested"}]}}),
            json!({"result": [{"name": "result"}]}),
            json!({"meta": {"count": 1}, "rows": [{"name": "first-array"}]}),
        ];
        let expected = ["top", "jobs", "data", "nested", "result", "first-array"];
        for (payload, want) in cases.iter().zip(expected) {
            let jobs = parse_jobs(payload).unwrap();
            assert_eq!(names(&jobs), [want], "payload {payload}");
        }
    }

    #[test]
    fn payload_without_any_list_is_unrecognized() {
        let err = parse_jobs(&json!({"status": "ok"})).unwrap_err();
        assert!(matches!(err, ReporterError::UnrecognizedPayload));
    }

    #[test]
    fn undecodable_items_are_skipped() {
        let payload = json!({"output": [{"name": "ok"}, "garbage", 7]});
        let jobs = parse_jobs(&payload).unwrap();
        assert_eq!(names(&jobs), ["ok"]);
    }

    #[test]
    fn false_and_null_error_markers_are_not_errors() {
        assert_eq!(payload_error(&json!({"error": false})), None);
        assert_eq!(payload_error(&json!({"error": null})), None);
        assert_eq!(payload_error(&json!({"output": []})), None);
        assert!(payload_error(&json!({"error": "boom"})).is_some());
    }
}
