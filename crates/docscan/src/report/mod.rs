//! Report composition: a summary page in front of the original document.

mod merge;

use std::io::BufWriter;
use std::path::Path;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use thiserror::Error;
use tracing::debug;

pub use merge::{image_to_pdf, merge_pdfs, page_count};

use crate::models::{DocumentFormat, ExtractedData};

const TITLE: &str = "Scan Report";
const FOOTER: &str = "Original document follows on the next pages.";
const DEFAULT_WRAP_WIDTH: usize = 90;
/// Keeps the labelled fields on the page for very long summaries.
const MAX_SUMMARY_LINES: usize = 28;

/// Errors from building the report artifact.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Unsupported source document: {0}")]
    UnsupportedSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the final artifact for a processed document.
#[derive(Debug, Clone, Copy)]
pub struct ReportComposer {
    wrap_width: usize,
}

impl Default for ReportComposer {
    fn default() -> Self {
        Self::new(DEFAULT_WRAP_WIDTH)
    }
}

impl ReportComposer {
    pub fn new(wrap_width: usize) -> Self {
        Self {
            wrap_width: wrap_width.max(10),
        }
    }

    /// Summary page followed by every page of the original, in order.
    pub fn compose(&self, record: &ExtractedData, source_path: &Path) -> Result<Vec<u8>, ReportError> {
        let original = match DocumentFormat::from_path(source_path) {
            Some(DocumentFormat::Pdf) => std::fs::read(source_path)?,
            Some(DocumentFormat::Image) => image_to_pdf(source_path)?,
            None => {
                return Err(ReportError::UnsupportedSource(
                    source_path.display().to_string(),
                ))
            }
        };

        let source_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let summary = self.render_summary_page(record, &source_name)?;

        let merged = merge_pdfs(&[summary, original])?;
        debug!(
            "Composed report for {} ({} bytes)",
            source_path.display(),
            merged.len()
        );
        Ok(merged)
    }

    /// Summary lines, each prefixed as a bullet and wrapped.
    pub fn summary_lines(&self, record: &ExtractedData) -> Vec<String> {
        let mut lines = Vec::new();
        for fragment in &record.summary {
            for (i, line) in wrap_text(fragment, self.wrap_width - 2).into_iter().enumerate() {
                let prefix = if i == 0 { "- " } else { "  " };
                lines.push(format!("{}{}", prefix, line));
            }
        }
        lines
    }

    /// Render the one-page summary as a standalone PDF.
    pub fn render_summary_page(
        &self,
        record: &ExtractedData,
        source_name: &str,
    ) -> Result<Vec<u8>, ReportError> {
        let (doc, page1, layer1) = PdfDocument::new(TITLE, Mm(210.0), Mm(297.0), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(format!("font error: {e}")))?;

        let mut y = Mm(280.0);
        layer.use_text(TITLE, 16.0, Mm(20.0), y, &bold);
        y -= Mm(8.0);
        layer.use_text(format!("Source: {}", source_name), 10.0, Mm(20.0), y, &font);
        y -= Mm(10.0);

        layer.use_text("Summary:", 11.0, Mm(20.0), y, &bold);
        y -= Mm(6.0);
        let mut summary = self.summary_lines(record);
        if summary.len() > MAX_SUMMARY_LINES {
            summary.truncate(MAX_SUMMARY_LINES);
            summary.push("  ...".to_string());
        }
        if summary.is_empty() {
            summary.push("-".to_string());
        }
        for line in &summary {
            layer.use_text(line.as_str(), 10.0, Mm(25.0), y, &font);
            y -= Mm(4.5);
        }

        y -= Mm(6.0);
        write_fields(&layer, &field_lines(record), y, &font, &bold);

        layer.use_text(FOOTER, 9.0, Mm(20.0), Mm(20.0), &font);

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| ReportError::Pdf(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ReportError::Pdf(format!("buffer error: {e}")))
    }
}

fn write_fields(
    layer: &PdfLayerReference,
    fields: &[(&'static str, String)],
    mut y: Mm,
    font: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    for (label, value) in fields {
        layer.use_text(format!("{}:", label), 11.0, Mm(20.0), y, bold);
        layer.use_text(value.as_str(), 11.0, Mm(65.0), y, font);
        y -= Mm(7.0);
    }
}

/// Labelled fields in page order, absent values already substituted.
pub fn field_lines(record: &ExtractedData) -> Vec<(&'static str, String)> {
    let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    let date = |value: Option<chrono::NaiveDate>, missing: &str| {
        value
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| missing.to_string())
    };

    vec![
        ("Document type", record.document_type.clone()),
        ("Issuer", record.issuer.clone()),
        ("Document date", date(record.document_date, "unknown")),
        (
            "Amount",
            format!("{:.2} {}", record.amount_total.unwrap_or(0.0), record.currency),
        ),
        ("Due date", date(record.due_date, "-")),
        ("IBAN", or_dash(&record.iban)),
        ("Invoice number", or_dash(&record.invoice_number)),
        (
            "Tax relevant",
            if record.is_tax_relevant { "yes" } else { "no" }.to_string(),
        ),
        ("Tax category", or_dash(&record.tax_category)),
    ]
}

/// Greedy word wrap at `max_chars`; words are never split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty()
            && current.chars().count() + word.chars().count() + 1 > max_chars
        {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
