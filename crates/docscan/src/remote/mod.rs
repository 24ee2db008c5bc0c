//! Remote archiving: document upload and payment reminders.

mod graph;

use std::path::Path;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;
use tracing::debug;

pub use graph::{GraphClient, GRAPH_BASE_URL};

use crate::models::ExtractedData;

/// Errors from the remote archive.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Parse(String),

    #[error("Remote not configured: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A calendar reminder for an upcoming payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub subject: String,
    pub body: String,
    /// Local wall-clock start in `time_zone`.
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// IANA zone name, e.g. `Europe/Berlin`.
    pub time_zone: String,
    pub location: String,
}

/// External system of record for processed documents.
#[async_trait]
pub trait RemoteArchiveService: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Upload `local_path` under `relative_path`; returns a link or path.
    async fn upload(&self, local_path: &Path, relative_path: &str) -> Result<String, RemoteError>;

    /// Create a calendar event; returns its id.
    async fn create_event(&self, event: &CalendarEvent) -> Result<String, RemoteError>;
}

/// Used when no remote is configured: the processed file is the record.
#[derive(Debug, Clone, Default)]
pub struct LocalOnlyRemote;

#[async_trait]
impl RemoteArchiveService for LocalOnlyRemote {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, local_path: &Path, _relative_path: &str) -> Result<String, RemoteError> {
        debug!("Remote disabled, keeping {} locally", local_path.display());
        Ok(local_path.display().to_string())
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, RemoteError> {
        debug!("Remote disabled, skipping event '{}'", event.subject);
        Ok(String::new())
    }
}

/// Remote path `<type>/<YYYY>/<MM>/<filename>`.
///
/// Uses the document date, or `today` when the record has none.
pub fn remote_relative_path(record: &ExtractedData, filename: &str, today: NaiveDate) -> String {
    let date = record.document_date.unwrap_or(today);
    format!(
        "{}/{:04}/{:02}/{}",
        crate::naming::sanitize_component(&record.document_type, crate::naming::DEFAULT_MAX_COMPONENT_LEN),
        date.year(),
        date.month(),
        filename
    )
}

/// Payment reminder for `record`, or `None` without a due date and amount.
///
/// Starts at `due_date` + `default_time`, ends at minute 59 of that hour.
pub fn payment_event(
    record: &ExtractedData,
    remote_link: &str,
    default_time: NaiveTime,
    time_zone: &str,
) -> Option<CalendarEvent> {
    if !record.has_payment_due() {
        return None;
    }
    let due = record.due_date?;
    let amount = record.amount_total?;

    let start = due.and_time(default_time);
    let end = start.with_minute(59).unwrap_or(start);

    let subject = format!(
        "Zahlung: {} - {:.2} {} ({})",
        record.issuer, amount, record.currency, record.document_type
    );

    let mut body = format!(
        "IBAN: {}\nReferenz: {}\nLink: {}",
        record.iban.as_deref().unwrap_or("-"),
        record.invoice_number.as_deref().unwrap_or("-"),
        remote_link
    );
    for line in &record.summary {
        body.push('\n');
        body.push_str(line);
    }

    Some(CalendarEvent {
        subject,
        body,
        start,
        end,
        time_zone: time_zone.to_string(),
        location: "Automatischer Reminder".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ExtractedData {
        let mut data = ExtractedData::minimal("");
        data.document_type = "Rechnung".to_string();
        data.issuer = "Beispiel GmbH".to_string();
        data.document_date = NaiveDate::from_ymd_opt(2024, 1, 2);
        data.amount_total = Some(49.99);
        data.due_date = NaiveDate::from_ymd_opt(2024, 1, 30);
        data.iban = Some("DE02120300000000202051".to_string());
        data.invoice_number = Some("INV-123".to_string());
        data.summary = vec!["Software-Abo".to_string()];
        data
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_path_uses_document_date() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            remote_relative_path(&record(), "x.pdf", today),
            "Rechnung/2024/01/x.pdf"
        );
    }

    #[test]
    fn test_relative_path_falls_back_to_today() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let data = ExtractedData::minimal("");
        assert_eq!(
            remote_relative_path(&data, "x.pdf", today),
            "unclassified/2025/06/x.pdf"
        );
    }

    #[test]
    fn test_payment_event_contents() {
        let event = payment_event(&record(), "https://example/x", nine(), "Europe/Berlin").unwrap();
        assert_eq!(event.subject, "Zahlung: Beispiel GmbH - 49.99 EUR (Rechnung)");
        assert_eq!(event.start.to_string(), "2024-01-30 09:00:00");
        assert_eq!(event.end.to_string(), "2024-01-30 09:59:00");
        assert!(event.body.contains("IBAN: DE02120300000000202051"));
        assert!(event.body.contains("Referenz: INV-123"));
        assert!(event.body.contains("Link: https://example/x"));
        assert!(event.body.ends_with("Software-Abo"));
        assert_eq!(event.time_zone, "Europe/Berlin");
    }

    #[test]
    fn test_no_event_without_due_date_or_amount() {
        let mut no_due = record();
        no_due.due_date = None;
        assert!(payment_event(&no_due, "l", nine(), "UTC").is_none());

        let mut no_amount = record();
        no_amount.amount_total = None;
        assert!(payment_event(&no_amount, "l", nine(), "UTC").is_none());
    }

    #[tokio::test]
    async fn test_local_only_returns_local_path() {
        let remote = LocalOnlyRemote;
        let location = remote
            .upload(Path::new("/data/processed/a.pdf"), "Rechnung/2024/01/a.pdf")
            .await
            .unwrap();
        assert_eq!(location, "/data/processed/a.pdf");
    }
}
