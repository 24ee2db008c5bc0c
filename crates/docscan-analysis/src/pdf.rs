//! PDF text layers and rasterisation.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::tools::{check_cmd_status, handle_cmd_output, ToolError};

const POPPLER_HINT: &str = "install poppler-utils";

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF tool not found: {0}")]
    ToolNotFound(String),

    #[error("PDF processing failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for PdfError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(hint) => Self::ToolNotFound(hint),
            ToolError::Failed(msg) => Self::Failed(msg),
            ToolError::Io(e) => Self::Io(e),
        }
    }
}

/// Structural PDF access used by the text extractor.
pub trait PdfToolkit: Send + Sync {
    /// Text layer of every page, in page order.
    fn page_texts(&self, pdf_path: &Path) -> Result<Vec<String>, PdfError>;

    /// Render pages `1..=max_pages` as PNG files under `out_dir`, in page order.
    fn rasterize(
        &self,
        pdf_path: &Path,
        max_pages: u32,
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, PdfError>;

    /// External binaries this toolkit needs.
    fn required_tools(&self) -> &[&'static str] {
        &[]
    }
}

/// Poppler command-line tools: `pdftotext`, `pdftoppm`, `pdfinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopplerToolkit;

impl PopplerToolkit {
    pub fn new() -> Self {
        Self
    }

    /// Page count from `pdfinfo`, `None` when it cannot be determined.
    pub fn page_count(&self, pdf_path: &Path) -> Option<u32> {
        let output = Command::new("pdfinfo").arg(pdf_path).output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_page_count(&String::from_utf8_lossy(&output.stdout))
    }
}

impl PdfToolkit for PopplerToolkit {
    fn page_texts(&self, pdf_path: &Path) -> Result<Vec<String>, PdfError> {
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(pdf_path)
            .arg("-")
            .output();
        let text = handle_cmd_output(
            output,
            &format!("pdftotext ({})", POPPLER_HINT),
            "pdftotext failed",
        )?;
        Ok(split_pages(&text))
    }

    fn rasterize(
        &self,
        pdf_path: &Path,
        max_pages: u32,
        dpi: u32,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, PdfError> {
        let last = match self.page_count(pdf_path) {
            Some(count) => count.min(max_pages),
            None => max_pages,
        };
        debug!("Rasterising pages 1-{} of {} at {} dpi", last, pdf_path.display(), dpi);

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi.to_string()])
            .args(["-f", "1", "-l", &last.to_string()])
            .arg(pdf_path)
            .arg(out_dir.join("page"))
            .status();
        check_cmd_status(
            status,
            &format!("pdftoppm ({})", POPPLER_HINT),
            "pdftoppm failed to convert PDF",
        )?;

        Ok((1..=last)
            .filter_map(|page| find_page_image(out_dir, page))
            .collect())
    }

    fn required_tools(&self) -> &[&'static str] {
        &["pdftotext", "pdftoppm", "pdfinfo"]
    }
}

/// Split `pdftotext` output into pages on form feeds.
fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
    // pdftotext terminates the last page with a form feed too.
    if pages.len() > 1 && pages.last().map(|p| p.trim().is_empty()).unwrap_or(false) {
        pages.pop();
    }
    pages
}

fn parse_page_count(pdfinfo: &str) -> Option<u32> {
    pdfinfo
        .lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|n| n.parse().ok())
}

/// pdftoppm pads page numbers to the width of the page count.
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    [1usize, 2, 3, 4]
        .into_iter()
        .map(|width| dir.join(format!("page-{:0width$}.png", page, width = width)))
        .find(|path| path.exists())
}
