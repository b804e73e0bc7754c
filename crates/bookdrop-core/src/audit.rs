use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC (for the audit trail).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// One append-only audit record: access decisions, stored transfers and
/// terminal import outcomes.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, user_id: i64) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: Some(user_id),
            authorized: None,
            file_name: None,
            path: None,
            bytes: None,
            outcome: None,
            error: None,
        }
    }

    pub fn auth(user_id: i64, authorized: bool) -> Self {
        let mut ev = Self::base("auth", user_id);
        ev.authorized = Some(authorized);
        ev
    }

    pub fn transfer(user_id: i64, file_name: &str, path: &Path, bytes: u64) -> Self {
        let mut ev = Self::base("transfer", user_id);
        ev.file_name = Some(file_name.to_string());
        ev.path = Some(path.display().to_string());
        ev.bytes = Some(bytes);
        ev
    }

    pub fn import(user_id: i64, file_name: &str, outcome: &str) -> Self {
        let mut ev = Self::base("import", user_id);
        ev.file_name = Some(file_name.to_string());
        ev.outcome = Some(outcome.to_string());
        ev
    }

    pub fn error(user_id: i64, error: &str) -> Self {
        let mut ev = Self::base("error", user_id);
        ev.error = Some(error.to_string());
        ev
    }
}

/// Append-only audit trail, either JSONL or a readable plain-text block per
/// event.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.outcome {
            event.outcome = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::Config("audit event is not a JSON object".to_string()));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn jsonl_audit_writes_one_line_per_event() {
        let log = AuditLogger::new(tmp_file("bookdrop-audit-test"), true);
        log.write(AuditEvent::auth(1, true)).unwrap();
        log.write(AuditEvent::auth(2, false)).unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.get("event").and_then(|v| v.as_str()), Some("auth"));
        assert_eq!(first.get("authorized").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn plain_text_audit_includes_fields() {
        let log = AuditLogger::new(tmp_file("bookdrop-audit-plain"), false);
        log.write(AuditEvent::transfer(
            7,
            "book.epub",
            Path::new("/tmp/downloads/book.epub"),
            1234,
        ))
        .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: transfer"));
        assert!(written.contains("book.epub"));
        assert!(written.contains("1234"));
    }

    #[test]
    fn long_outcome_is_truncated_on_write() {
        let log = AuditLogger::new(tmp_file("bookdrop-audit-trunc"), true);
        let outcome = "x".repeat(AUDIT_MAX_TEXT + 50);
        log.write(AuditEvent::import(1, "a.pdf", &outcome)).unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("..."));
    }
}
