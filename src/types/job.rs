use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

/// One job record as returned by the Baculum `jobs` endpoint.
///
/// Decoded through `BaculumRow`, which keeps each accepted spelling of a
/// column in its own slot: real rows carry several of them at once
/// (`name` next to `job`, `client` next to `clientname`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BaculumRow")]
pub struct BaculaJob {
    pub jobid: Option<i64>,
    pub name: Option<String>,
    pub client: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub level: Option<String>,
    pub jobstatus: Option<String>,
    pub jobbytes: u64,
    pub jobfiles: u64,

    pub starttime: Option<RawTimestamp>,
    pub endtime: Option<RawTimestamp>,
    pub realendtime: Option<RawTimestamp>,
    pub schedtime: Option<RawTimestamp>,
    pub start_time: Option<RawTimestamp>,
    pub end_time: Option<RawTimestamp>,
}

/// Wire shape of a job row. Numeric columns arrive either as JSON numbers
/// or as strings depending on the API version, so they go through
/// `lenient_*`. `job` (the unique run name) is ignored.
#[derive(Debug, Deserialize)]
struct BaculumRow {
    #[serde(default, alias = "JobId", deserialize_with = "lenient_i64")]
    jobid: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    job_id: Option<i64>,
    #[serde(default, alias = "Name")]
    name: Option<String>,
    #[serde(default)]
    job_name: Option<String>,
    #[serde(default, alias = "Client")]
    client: Option<String>,
    #[serde(default)]
    clientname: Option<String>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default, rename = "type", alias = "Type")]
    type_code: Option<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default, alias = "Level")]
    level: Option<String>,
    #[serde(default, alias = "JobStatus")]
    jobstatus: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "JobBytes", deserialize_with = "lenient_u64")]
    jobbytes: u64,
    #[serde(default, alias = "JobFiles", deserialize_with = "lenient_u64")]
    jobfiles: u64,

    #[serde(default)]
    starttime: Option<RawTimestamp>,
    #[serde(default)]
    endtime: Option<RawTimestamp>,
    #[serde(default)]
    realendtime: Option<RawTimestamp>,
    #[serde(default)]
    schedtime: Option<RawTimestamp>,
    #[serde(default)]
    start_time: Option<RawTimestamp>,
    #[serde(default)]
    end_time: Option<RawTimestamp>,
}

/// First non-blank value, in order of preference.
fn first_text<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}

impl From<BaculumRow> for BaculaJob {
    fn from(row: BaculumRow) -> Self {
        Self {
            jobid: row.jobid.or(row.job_id),
            name: first_text([row.name, row.job_name]),
            client: first_text([row.client, row.clientname, row.client_name]),
            job_type: first_text([row.type_code, row.job_type]),
            level: row.level,
            jobstatus: first_text([row.jobstatus, row.status]),
            jobbytes: row.jobbytes,
            jobfiles: row.jobfiles,
            starttime: row.starttime,
            endtime: row.endtime,
            realendtime: row.realendtime,
            schedtime: row.schedtime,
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

impl BaculaJob {
    /// First timestamp field that parses, in order of preference.
    pub fn best_timestamp(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        [
            &self.starttime,
            &self.endtime,
            &self.realendtime,
            &self.schedtime,
            &self.start_time,
            &self.end_time,
        ]
        .into_iter()
        .flatten()
        .find_map(|raw| raw.parse(offset))
    }

    pub fn status(&self) -> JobStatus {
        self.jobstatus
            .as_deref()
            .and_then(|s| s.chars().next())
            .map(JobStatus::from_code)
            .unwrap_or(JobStatus::Other('?'))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed job")
    }

    pub fn display_client(&self) -> &str {
        self.client.as_deref().unwrap_or("unknown client")
    }
}

/// A timestamp column before interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

impl RawTimestamp {
    /// Naive forms are read in the report offset; epoch values above 1e12
    /// are taken as milliseconds.
    pub fn parse(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        match self {
            RawTimestamp::Epoch(n) => epoch_to_datetime(*n, offset),
            RawTimestamp::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Some(dt.with_timezone(&offset));
                }
                for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
                    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                        return offset.from_local_datetime(&naive).single();
                    }
                }
                s.parse::<i64>()
                    .ok()
                    .and_then(|n| epoch_to_datetime(n, offset))
            }
        }
    }
}

fn epoch_to_datetime(n: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let dt = if n.abs() >= 1_000_000_000_000 {
        DateTime::from_timestamp_millis(n)?
    } else {
        DateTime::from_timestamp(n, 0)?
    };
    Some(dt.with_timezone(&offset))
}

/// Report bucket for a job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Unknown,
}

/// Bacula `JobStatus` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Terminated,
    TerminatedWithWarnings,
    NonFatalError,
    Canceled,
    Incomplete,
    VerifyDifferences,
    ErrorTerminated,
    FatalError,
    Running,
    Created,
    Blocked,
    /// Any of the "waiting on ..." states.
    Waiting(char),
    Other(char),
}

impl JobStatus {
    pub fn from_code(code: char) -> Self {
        match code {
            'T' => Self::Terminated,
            'W' => Self::TerminatedWithWarnings,
            'e' => Self::NonFatalError,
            'A' => Self::Canceled,
            'I' => Self::Incomplete,
            'D' => Self::VerifyDifferences,
            'E' => Self::ErrorTerminated,
            'f' => Self::FatalError,
            'R' => Self::Running,
            'C' => Self::Created,
            'B' => Self::Blocked,
            'F' | 'S' | 'm' | 'M' | 's' | 'j' | 'c' | 'd' | 't' | 'p' | 'a' | 'i' => {
                Self::Waiting(code)
            }
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Terminated => 'T',
            Self::TerminatedWithWarnings => 'W',
            Self::NonFatalError => 'e',
            Self::Canceled => 'A',
            Self::Incomplete => 'I',
            Self::VerifyDifferences => 'D',
            Self::ErrorTerminated => 'E',
            Self::FatalError => 'f',
            Self::Running => 'R',
            Self::Created => 'C',
            Self::Blocked => 'B',
            Self::Waiting(c) | Self::Other(c) => *c,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Terminated => Severity::Info,
            Self::TerminatedWithWarnings
            | Self::NonFatalError
            | Self::Canceled
            | Self::Incomplete
            | Self::VerifyDifferences => Severity::Warning,
            Self::ErrorTerminated | Self::FatalError => Severity::Critical,
            Self::Running | Self::Created | Self::Blocked | Self::Waiting(_) | Self::Other(_) => {
                Severity::Unknown
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Terminated => "Completed successfully",
            Self::TerminatedWithWarnings => "Completed with warnings",
            Self::NonFatalError => "Non-fatal error",
            Self::Canceled => "Canceled",
            Self::Incomplete => "Incomplete",
            Self::VerifyDifferences => "Verify differences",
            Self::ErrorTerminated => "Terminated in error",
            Self::FatalError => "Fatal error",
            Self::Running => "Running",
            Self::Created => "Created, not yet running",
            Self::Blocked => "Blocked",
            Self::Waiting(_) => "Waiting",
            Self::Other(_) => "Unknown status",
        }
    }
}

pub fn job_type_label(code: &str) -> String {
    match code {
        "B" => "Backup",
        "R" => "Restore",
        "V" => "Verify",
        "A" | "D" => "Admin",
        "C" | "c" => "Copy",
        "M" | "g" => "Migration",
        "" => "Unknown",
        other => return other.to_string(),
    }
    .to_string()
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer)
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(
        match Option::<NumberOrText>::deserialize(deserializer)? {
            Some(NumberOrText::Int(n)) => Some(n),
            Some(NumberOrText::Float(f)) => Some(f as i64),
            Some(NumberOrText::Text(s)) => s.trim().parse::<i64>().ok(),
            None => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[test]
    fn decodes_string_and_numeric_columns() {
        let job: BaculaJob = serde_json::from_value(json!({
            "jobid": "42",
            "name": "nightly-fs",
            "client": "srv-files",
            "type": "B",
            "level": "I",
            "jobstatus": "T",
            "jobbytes": "1048576",
            "jobfiles": 12,
            "starttime": "2026-10-16 22:00:03"
        }))
        .unwrap();
        assert_eq!(job.jobid, Some(42));
        assert_eq!(job.jobbytes, 1_048_576);
        assert_eq!(job.jobfiles, 12);
        assert_eq!(job.job_type.as_deref(), Some("B"));
        assert_eq!(job.status(), JobStatus::Terminated);
    }

    #[test]
    fn full_baculum_row_with_overlapping_columns_decodes() {
        let job: BaculaJob = serde_json::from_value(json!({
            "jobid": 1,
            "job": "BackupClient1.2026-10-16_23.05.00_03",
            "name": "BackupClient1",
            "type": "B",
            "level": "F",
            "clientid": 1,
            "client": "fd01",
            "clientname": "fd01-fd",
            "jobstatus": "T",
            "schedtime": "2026-10-16 23:05:00",
            "starttime": "2026-10-16 23:05:02",
            "endtime": "2026-10-16 23:07:41",
            "realendtime": "2026-10-16 23:07:41",
            "jobtdate": 1760666861,
            "volsessionid": 1,
            "jobfiles": 2417,
            "jobbytes": 182735421,
            "readbytes": 182735421,
            "joberrors": 0,
            "jobmissingfiles": 0,
            "poolid": 1,
            "filesetid": 1,
            "priorjobid": 0,
            "purgedfiles": 0,
            "hasbase": 0
        }))
        .unwrap();
        assert_eq!(job.jobid, Some(1));
        assert_eq!(job.display_name(), "BackupClient1");
        assert_eq!(job.display_client(), "fd01");
        assert_eq!(job.jobbytes, 182_735_421);
        assert_eq!(job.status(), JobStatus::Terminated);
    }

    #[test]
    fn alternate_spellings_fill_missing_columns() {
        let job: BaculaJob = serde_json::from_value(json!({
            "job_id": "7",
            "job_name": "catalog",
            "client_name": "dir01-fd",
            "status": "E"
        }))
        .unwrap();
        assert_eq!(job.jobid, Some(7));
        assert_eq!(job.display_name(), "catalog");
        assert_eq!(job.display_client(), "dir01-fd");
        assert_eq!(job.status(), JobStatus::ErrorTerminated);
    }

    #[test]
    fn null_numeric_columns_default_to_zero() {
        let job: BaculaJob =
            serde_json::from_value(json!({"name": "x", "jobbytes": null})).unwrap();
        assert_eq!(job.jobbytes, 0);
        assert_eq!(job.jobid, None);
    }

    #[test]
    fn best_timestamp_skips_unparseable_fields() {
        let job: BaculaJob = serde_json::from_value(json!({
            "starttime": "",
            "endtime": "not a date",
            "realendtime": "2026-10-16T23:10:00-03:00"
        }))
        .unwrap();
        let ts = job.best_timestamp(brt()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-10-16T23:10:00-03:00");
    }

    #[test]
    fn naive_timestamps_use_report_offset() {
        let raw = RawTimestamp::Text("2026-10-16 01:30:00".into());
        let ts = raw.parse(brt()).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-10-16T01:30:00-03:00");
    }

    #[test]
    fn epoch_seconds_and_millis_agree() {
        let secs = RawTimestamp::Epoch(1_760_000_000).parse(brt()).unwrap();
        let millis = RawTimestamp::Epoch(1_760_000_000_000).parse(brt()).unwrap();
        assert_eq!(secs, millis);
    }

    #[test]
    fn status_table_maps_to_severity() {
        assert_eq!(JobStatus::from_code('T').severity(), Severity::Info);
        assert_eq!(JobStatus::from_code('E').severity(), Severity::Critical);
        assert_eq!(JobStatus::from_code('f').severity(), Severity::Critical);
        assert_eq!(JobStatus::from_code('W').severity(), Severity::Warning);
        assert_eq!(JobStatus::from_code('A').severity(), Severity::Warning);
        assert_eq!(JobStatus::from_code('R').severity(), Severity::Unknown);
        assert_eq!(JobStatus::from_code('m').severity(), Severity::Unknown);
        assert_eq!(JobStatus::from_code('Z').severity(), Severity::Unknown);
        assert_eq!(JobStatus::from_code('Z').code(), 'Z');
    }

    #[test]
    fn missing_status_is_unknown() {
        let job = BaculaJob::default();
        assert_eq!(job.status().severity(), Severity::Unknown);
    }

    #[test]
    fn job_type_labels() {
        assert_eq!(job_type_label("B"), "Backup");
        assert_eq!(job_type_label("R"), "Restore");
        assert_eq!(job_type_label("X"), "X");
    }
}
