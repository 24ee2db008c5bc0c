//! Default prompts for structured extraction.

/// System prompt; `{schema}` is replaced with the pretty-printed JSON schema.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You extract structured data from scanned financial documents (invoices, receipts, notices, contracts).

Reply with a single JSON object and nothing else. It must conform to this JSON schema:

{schema}

Rules:
- Use null for values that are not present in the document.
- Dates are YYYY-MM-DD.
- amount_total is the gross total as a number, without currency symbols.
- currency is an ISO 4217 code such as EUR.
- confidence maps field names to a value between 0 and 1.
- summary holds two to five short fragments describing the document."#;

/// User message wrapping the document text.
pub const DEFAULT_USER_PROMPT: &str = "Document text:\n\n{content}";
