//! SQL DDL for the report tables.
//! SQLite-first; column names follow the hosted tables they mirror.

/// Tables:
/// - `whatsapp_message_templates`: named message bodies, `name` UNIQUE
/// - `scheduled_reports`: one row per recipient of a template
/// - `integrations`: per-service connection settings, looked up by `type`
/// - `scheduled_reports_logs`: one row per run, `details` holds JSON text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS whatsapp_message_templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category TEXT NULL,
    content TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL  -- RFC3339
);

CREATE TABLE IF NOT EXISTS scheduled_reports (
    id TEXT PRIMARY KEY,
    name TEXT NULL,
    phone_number TEXT NOT NULL,
    template_id TEXT NOT NULL REFERENCES whatsapp_message_templates(id) ON DELETE CASCADE,
    schedule_time TEXT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scheduled_reports_template ON scheduled_reports(template_id);

CREATE TABLE IF NOT EXISTS integrations (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    base_url TEXT NULL,
    api_token TEXT NULL,
    username TEXT NULL,
    password TEXT NULL,
    instance_name TEXT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_integrations_type ON integrations(type);

CREATE TABLE IF NOT EXISTS scheduled_reports_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id TEXT NULL,
    template_id TEXT NOT NULL,
    status TEXT NOT NULL,
    success INTEGER NOT NULL,
    recipients_total INTEGER NOT NULL,
    recipients_success INTEGER NOT NULL,
    execution_time_ms INTEGER NOT NULL,
    error_message TEXT NULL,
    details TEXT NOT NULL, -- JSON
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL
);
"#;
