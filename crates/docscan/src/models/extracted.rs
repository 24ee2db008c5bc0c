//! Structured record extracted from a document's text.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FALLBACK_DOCUMENT_TYPE: &str = "unclassified";
pub const FALLBACK_ISSUER: &str = "unknown";
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Characters of raw text kept as the summary of a minimal record.
pub const MINIMAL_SUMMARY_CHARS: usize = 200;

/// Financially relevant fields of a scanned document.
///
/// Serialises to the same shape the extraction schema validates, so a
/// record can be checked against the schema after a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    /// Document category, e.g. "Rechnung".
    pub document_type: String,
    /// Sender organisation or person.
    pub issuer: String,
    pub document_date: Option<NaiveDate>,
    pub amount_total: Option<f64>,
    /// ISO 4217 code.
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub iban: Option<String>,
    pub invoice_number: Option<String>,
    pub is_tax_relevant: bool,
    pub tax_category: Option<String>,
    /// Per-field confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
    /// Short human-readable summary fragments.
    #[serde(default)]
    pub summary: Vec<String>,
}

impl ExtractedData {
    /// Deterministic record used when structured extraction is disabled.
    pub fn minimal(text: &str) -> Self {
        let trimmed = text.trim();
        let summary = if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.chars().take(MINIMAL_SUMMARY_CHARS).collect()]
        };

        Self {
            document_type: FALLBACK_DOCUMENT_TYPE.to_string(),
            issuer: FALLBACK_ISSUER.to_string(),
            document_date: None,
            amount_total: None,
            currency: DEFAULT_CURRENCY.to_string(),
            due_date: None,
            iban: None,
            invoice_number: None,
            is_tax_relevant: false,
            tax_category: None,
            confidence: BTreeMap::new(),
            summary,
        }
    }

    /// Build a record from an already validated JSON payload.
    ///
    /// Missing keys fall back to the minimal record's defaults; dates are
    /// parsed leniently and unparseable ones become `None`.
    pub fn from_payload(payload: &Value) -> Self {
        let text = |key: &str| -> Option<String> {
            payload
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let date = |key: &str| payload.get(key).and_then(Value::as_str).and_then(parse_lenient_date);

        let confidence = payload
            .get("confidence")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                    .collect()
            })
            .unwrap_or_default();

        let summary = payload
            .get("summary")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            document_type: text("document_type")
                .unwrap_or_else(|| FALLBACK_DOCUMENT_TYPE.to_string()),
            issuer: text("issuer").unwrap_or_else(|| FALLBACK_ISSUER.to_string()),
            document_date: date("document_date"),
            amount_total: payload.get("amount_total").and_then(Value::as_f64),
            currency: text("currency").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            due_date: date("due_date"),
            iban: text("iban"),
            invoice_number: text("invoice_number"),
            is_tax_relevant: payload
                .get("is_tax_relevant")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            tax_category: text("tax_category"),
            confidence,
            summary,
        }
    }

    /// Serialise to a JSON value in schema shape.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// True when a payment reminder can be scheduled.
    pub fn has_payment_due(&self) -> bool {
        self.due_date.is_some() && self.amount_total.is_some_and(|amount| amount > 0.0)
    }
}

/// Parse `YYYY-MM-DD`, also accepting an ISO date-time whose first ten
/// characters are a date.
pub fn parse_lenient_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    value
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice_payload() -> Value {
        json!({
            "document_type": "Rechnung",
            "issuer": "Beispiel GmbH",
            "document_date": "2024-01-02",
            "amount_total": 49.99,
            "currency": "EUR",
            "due_date": "2024-01-30",
            "iban": "DE02120300000000202051",
            "invoice_number": "INV-123",
            "is_tax_relevant": true,
            "tax_category": "Werbungskosten",
            "confidence": {"amount_total": 0.9},
            "summary": ["Rechnung fuer Software-Abo", "Zahlbar bis 30.01.2024"]
        })
    }

    #[test]
    fn test_from_payload_full_invoice() {
        let data = ExtractedData::from_payload(&invoice_payload());
        assert_eq!(data.document_type, "Rechnung");
        assert_eq!(data.issuer, "Beispiel GmbH");
        assert_eq!(data.document_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(data.amount_total, Some(49.99));
        assert_eq!(data.due_date, NaiveDate::from_ymd_opt(2024, 1, 30));
        assert_eq!(data.invoice_number.as_deref(), Some("INV-123"));
        assert!(data.is_tax_relevant);
        assert_eq!(data.confidence.get("amount_total"), Some(&0.9));
        assert_eq!(data.summary.len(), 2);
        assert!(data.has_payment_due());
    }

    #[test]
    fn test_from_payload_defaults_for_missing_keys() {
        let data = ExtractedData::from_payload(&json!({"document_date": "not a date"}));
        assert_eq!(data.document_type, FALLBACK_DOCUMENT_TYPE);
        assert_eq!(data.issuer, FALLBACK_ISSUER);
        assert_eq!(data.currency, DEFAULT_CURRENCY);
        assert_eq!(data.document_date, None);
        assert!(!data.has_payment_due());
    }

    #[test]
    fn test_minimal_truncates_summary() {
        let text = "x".repeat(500);
        let data = ExtractedData::minimal(&text);
        assert_eq!(data.summary, vec!["x".repeat(MINIMAL_SUMMARY_CHARS)]);
        assert_eq!(data.document_type, "unclassified");
        assert!(!data.is_tax_relevant);
    }

    #[test]
    fn test_minimal_blank_text_has_empty_summary() {
        assert!(ExtractedData::minimal("  \n ").summary.is_empty());
    }

    #[test]
    fn test_lenient_date_accepts_datetime_prefix() {
        assert_eq!(
            parse_lenient_date("2024-03-05T10:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_lenient_date("05.03.2024"), None);
        assert_eq!(parse_lenient_date("2024"), None);
    }

    #[test]
    fn test_zero_amount_is_not_a_payment() {
        let mut data = ExtractedData::from_payload(&invoice_payload());
        data.amount_total = Some(0.0);
        assert!(!data.has_payment_due());
    }
}
