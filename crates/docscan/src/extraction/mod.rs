//! Structured extraction: text in, validated [`ExtractedData`] out.

mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub use schema::{ExtractionSchema, SchemaError};

use crate::models::ExtractedData;

/// Errors from structured extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction service '{service}' failed: {message}")]
    Service { service: String, message: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Anything that turns document text into a raw JSON payload.
///
/// Implementations do not validate; [`StructuredExtractor`] does.
#[async_trait]
pub trait StructuredExtractionService: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn extract(&self, text: &str, schema: &ExtractionSchema) -> Result<Value, ExtractionError>;
}

/// Validating front for a [`StructuredExtractionService`].
///
/// Without a service (extraction disabled) it returns the deterministic
/// minimal record and never fails.
#[derive(Clone)]
pub struct StructuredExtractor {
    service: Option<Arc<dyn StructuredExtractionService>>,
}

impl StructuredExtractor {
    pub fn new(service: Arc<dyn StructuredExtractionService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    pub fn disabled() -> Self {
        Self { service: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.service.is_some()
    }

    /// Extract and validate. Any schema violation rejects the whole payload.
    pub async fn extract(
        &self,
        text: &str,
        schema: &ExtractionSchema,
    ) -> Result<ExtractedData, ExtractionError> {
        let Some(service) = &self.service else {
            warn!("Structured extraction disabled, using minimal record");
            return Ok(ExtractedData::minimal(text));
        };

        debug!("Extracting structured data via {}", service.name());
        let payload = service.extract(text, schema).await?;
        schema.validate(&payload)?;
        Ok(ExtractedData::from_payload(&payload))
    }
}

impl std::fmt::Debug for StructuredExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredExtractor")
            .field("service", &self.service.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedService(Value);

    #[async_trait]
    impl StructuredExtractionService for FixedService {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract(&self, _text: &str, _schema: &ExtractionSchema) -> Result<Value, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingService;

    #[async_trait]
    impl StructuredExtractionService for FailingService {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract(&self, _text: &str, _schema: &ExtractionSchema) -> Result<Value, ExtractionError> {
            Err(ExtractionError::Service {
                service: "failing".to_string(),
                message: "HTTP 500".to_string(),
            })
        }
    }

    fn payload() -> Value {
        json!({
            "document_type": "Quittung",
            "issuer": "Baumarkt",
            "document_date": "2024-05-10",
            "amount_total": 23.4,
            "currency": "EUR",
            "due_date": null,
            "iban": null,
            "invoice_number": null,
            "is_tax_relevant": false,
            "tax_category": null,
            "confidence": {},
            "summary": ["Kassenbon"]
        })
    }

    #[tokio::test]
    async fn test_disabled_returns_conformant_minimal_record() {
        let schema = ExtractionSchema::bundled().unwrap();
        let extractor = StructuredExtractor::disabled();
        let data = extractor.extract("Stromabrechnung 2024", &schema).await.unwrap();
        assert_eq!(data.document_type, "unclassified");
        assert_eq!(data.summary, vec!["Stromabrechnung 2024".to_string()]);
        schema.validate(&data.to_value()).unwrap();
    }

    #[tokio::test]
    async fn test_valid_payload_is_converted() {
        let schema = ExtractionSchema::bundled().unwrap();
        let extractor = StructuredExtractor::new(Arc::new(FixedService(payload())));
        let data = extractor.extract("text", &schema).await.unwrap();
        assert_eq!(data.issuer, "Baumarkt");
        assert_eq!(data.amount_total, Some(23.4));
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected_not_coerced() {
        let schema = ExtractionSchema::bundled().unwrap();
        let mut bad = payload();
        bad["amount_total"] = json!("23,40");
        let extractor = StructuredExtractor::new(Arc::new(FixedService(bad)));

        let err = extractor.extract("text", &schema).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Schema(SchemaError::Violations(_))));
    }

    #[tokio::test]
    async fn test_service_errors_propagate() {
        let schema = ExtractionSchema::bundled().unwrap();
        let extractor = StructuredExtractor::new(Arc::new(FailingService));
        let err = extractor.extract("text", &schema).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }
}
