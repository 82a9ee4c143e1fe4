use crate::db::models::{DbIntegration, DbRunLog, DbScheduledReport, DbTemplate, NewRunLog};
use crate::db::schema::SQLITE_INIT;
use crate::error::ReporterError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

#[derive(Clone)]
pub struct ReportStorage {
    pool: SqlitePool,
}

impl ReportStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, ReporterError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), ReporterError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn template_by_id(&self, id: &str) -> Result<Option<DbTemplate>, ReporterError> {
        let row = sqlx::query_as::<_, DbTemplate>(
            r#"SELECT id, name, category, content, is_active
               FROM whatsapp_message_templates WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn template_by_name(&self, name: &str) -> Result<Option<DbTemplate>, ReporterError> {
        let row = sqlx::query_as::<_, DbTemplate>(
            r#"SELECT id, name, category, content, is_active
               FROM whatsapp_message_templates WHERE name = ?"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Upsert by unique name. Returns the row id.
    pub async fn upsert_template(&self, template: &DbTemplate) -> Result<String, ReporterError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO whatsapp_message_templates (
                id, name, category, content, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                category=excluded.category,
                content=excluded.content,
                is_active=excluded.is_active,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.category)
        .bind(&template.content)
        .bind(template.is_active)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let rec: (String,) =
            sqlx::query_as("SELECT id FROM whatsapp_message_templates WHERE name = ?")
                .bind(&template.name)
                .fetch_one(&self.pool)
                .await?;
        Ok(rec.0)
    }

    pub async fn insert_scheduled_report(
        &self,
        report: &DbScheduledReport,
    ) -> Result<(), ReporterError> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_reports (
                id, name, phone_number, template_id, schedule_time, is_active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.id)
        .bind(&report.name)
        .bind(&report.phone_number)
        .bind(&report.template_id)
        .bind(&report.schedule_time)
        .bind(report.is_active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active recipients of a template, oldest first.
    pub async fn active_recipients(
        &self,
        template_id: &str,
    ) -> Result<Vec<DbScheduledReport>, ReporterError> {
        let rows = sqlx::query_as::<_, DbScheduledReport>(
            r#"SELECT id, name, phone_number, template_id, schedule_time, is_active
               FROM scheduled_reports
               WHERE template_id = ? AND is_active = 1
               ORDER BY created_at, id"#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn upsert_integration(
        &self,
        integration: &DbIntegration,
    ) -> Result<(), ReporterError> {
        sqlx::query(
            r#"
            INSERT INTO integrations (
                id, type, name, base_url, api_token, username, password, instance_name, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                type=excluded.type,
                name=excluded.name,
                base_url=excluded.base_url,
                api_token=excluded.api_token,
                username=excluded.username,
                password=excluded.password,
                instance_name=excluded.instance_name,
                is_active=excluded.is_active
            "#,
        )
        .bind(&integration.id)
        .bind(&integration.kind)
        .bind(&integration.name)
        .bind(&integration.base_url)
        .bind(&integration.api_token)
        .bind(&integration.username)
        .bind(&integration.password)
        .bind(&integration.instance_name)
        .bind(integration.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// First active integration of the given type.
    pub async fn active_integration(
        &self,
        kind: &str,
    ) -> Result<Option<DbIntegration>, ReporterError> {
        let row = sqlx::query_as::<_, DbIntegration>(
            r#"SELECT id, type, name, base_url, api_token, username, password,
                      instance_name, is_active
               FROM integrations WHERE type = ? AND is_active = 1
               ORDER BY id LIMIT 1"#,
        )
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_run_log(&self, log: &NewRunLog) -> Result<i64, ReporterError> {
        let details = serde_json::to_string(&log.details)?;
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_reports_logs (
                report_id, template_id, status, success, recipients_total,
                recipients_success, execution_time_ms, error_message, details,
                started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.report_id)
        .bind(&log.template_id)
        .bind(log.status.as_str())
        .bind(log.success)
        .bind(log.recipients_total as i64)
        .bind(log.recipients_success as i64)
        .bind(log.execution_time_ms as i64)
        .bind(&log.error_message)
        .bind(details)
        .bind(log.started_at.to_rfc3339())
        .bind(log.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent runs first.
    pub async fn recent_run_logs(&self, limit: u32) -> Result<Vec<DbRunLog>, ReporterError> {
        let rows = sqlx::query(
            r#"SELECT id, report_id, template_id, status, success, recipients_total,
               recipients_success, execution_time_ms, error_message, details,
               started_at, finished_at
               FROM scheduled_reports_logs ORDER BY id DESC LIMIT ?"#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_log).collect()
    }

    fn row_to_log(row: SqliteRow) -> Result<DbRunLog, ReporterError> {
        let details_json: String = row.try_get("details")?;
        let started_str: String = row.try_get("started_at")?;
        let finished_str: String = row.try_get("finished_at")?;
        let success_i: i64 = row.try_get("success")?;

        let details = serde_json::from_str(&details_json)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(DbRunLog {
            id: row.try_get("id")?,
            report_id: row.try_get("report_id")?,
            template_id: row.try_get("template_id")?,
            status: row.try_get("status")?,
            success: success_i != 0,
            recipients_total: row.try_get("recipients_total")?,
            recipients_success: row.try_get("recipients_success")?,
            execution_time_ms: row.try_get("execution_time_ms")?,
            error_message: row.try_get("error_message")?,
            details,
            started_at: parse_rfc3339(&started_str)?,
            finished_at: parse_rfc3339(&finished_str)?,
        })
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, ReporterError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::RunStatus;
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    async fn temp_storage(tag: &str) -> (ReportStorage, std::path::PathBuf) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("bacula-reporter-{tag}-{}-{nanos}.sqlite", std::process::id()));
        let storage = ReportStorage::connect(&format!("sqlite:{}", path.display()))
            .await
            .expect("open storage");
        (storage, path)
    }

    fn template(id: &str, name: &str, active: bool) -> DbTemplate {
        DbTemplate {
            id: id.into(),
            name: name.into(),
            category: Some("bacula".into()),
            content: "Total: {{total_jobs}}".into(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn templates_resolve_by_id_and_name() {
        let (storage, path) = temp_storage("templates").await;
        storage.upsert_template(&template("t1", "daily", true)).await.unwrap();

        let by_name = storage.template_by_name("daily").await.unwrap().unwrap();
        assert_eq!(by_name.id, "t1");
        assert!(by_name.is_active);
        assert!(storage.template_by_id("t1").await.unwrap().is_some());
        assert!(storage.template_by_id("missing").await.unwrap().is_none());

        // upsert keeps the original id
        let id = storage.upsert_template(&template("t2", "daily", false)).await.unwrap();
        assert_eq!(id, "t1");
        assert!(!storage.template_by_id("t1").await.unwrap().unwrap().is_active);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn only_active_recipients_of_template_are_listed() {
        let (storage, path) = temp_storage("recipients").await;
        storage.upsert_template(&template("t1", "daily", true)).await.unwrap();
        storage.upsert_template(&template("t2", "weekly", true)).await.unwrap();
        for (id, tpl, active) in [("r1", "t1", true), ("r2", "t1", false), ("r3", "t2", true)] {
            storage
                .insert_scheduled_report(&DbScheduledReport {
                    id: id.into(),
                    name: None,
                    phone_number: "5511999999999".into(),
                    template_id: tpl.into(),
                    schedule_time: Some("08:00".into()),
                    is_active: active,
                })
                .await
                .unwrap();
        }

        let rows = storage.active_recipients("t1").await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["r1"]);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn inactive_integrations_are_ignored() {
        let (storage, path) = temp_storage("integrations").await;
        storage
            .upsert_integration(&DbIntegration {
                id: "i1".into(),
                kind: "evolution_api".into(),
                name: "WhatsApp".into(),
                base_url: None,
                api_token: None,
                username: None,
                password: None,
                instance_name: Some("ops".into()),
                is_active: false,
            })
            .await
            .unwrap();
        assert!(storage.active_integration("evolution_api").await.unwrap().is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn run_logs_round_trip_newest_first() {
        let (storage, path) = temp_storage("logs").await;
        for status in [RunStatus::Success, RunStatus::Partial] {
            storage
                .insert_run_log(&NewRunLog {
                    report_id: None,
                    template_id: "t1".into(),
                    status,
                    success: true,
                    recipients_total: 2,
                    recipients_success: 1,
                    execution_time_ms: 15,
                    error_message: None,
                    details: json!({"results": [{"phone_number": "1", "success": true}]}),
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let logs = storage.recent_run_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, "partial");
        assert_eq!(logs[1].status, "success");
        assert_eq!(logs[0].details["results"][0]["success"], true);

        let _ = std::fs::remove_file(&path);
    }
}
