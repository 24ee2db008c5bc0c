//! Text extraction with OCR fallback.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use docscan::config::OcrSettings;
use docscan::pipeline::{TextSource, TextSourceError};
use docscan::DocumentFormat;

use crate::ocr::{OcrBackend, OcrError, TesseractBackend};
use crate::pdf::{PdfError, PdfToolkit, PopplerToolkit};
use crate::tools::check_binary;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("OCR is disabled; cannot read image {0}")]
    OcrDisabled(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExtractionError> for TextSourceError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::UnsupportedFileType(ext) => Self::Unsupported(ext),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Reads text from PDFs and images.
///
/// PDFs use their text layer when it has any content; otherwise the first
/// `max_pages` pages are rasterised and OCR'd. Images are OCR'd directly.
pub struct TextExtractor {
    ocr: Arc<dyn OcrBackend>,
    pdf: Arc<dyn PdfToolkit>,
    ocr_enabled: bool,
    max_pages: u32,
    dpi: u32,
}

impl TextExtractor {
    /// Tesseract + Poppler configured from `settings`.
    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self::with_backends(
            settings,
            Arc::new(TesseractBackend::from_settings(settings)),
            Arc::new(PopplerToolkit::new()),
        )
    }

    pub fn with_backends(
        settings: &OcrSettings,
        ocr: Arc<dyn OcrBackend>,
        pdf: Arc<dyn PdfToolkit>,
    ) -> Self {
        Self {
            ocr,
            pdf,
            ocr_enabled: settings.enabled,
            max_pages: settings.max_pages,
            dpi: settings.dpi,
        }
    }

    pub fn ocr_backend(&self) -> &dyn OcrBackend {
        self.ocr.as_ref()
    }

    /// Extract text from a file based on its extension.
    pub fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        match DocumentFormat::from_path(path) {
            Some(DocumentFormat::Pdf) => self.extract_pdf(path),
            Some(DocumentFormat::Image) => self.extract_image(path),
            None => Err(ExtractionError::UnsupportedFileType(
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )),
        }
    }

    fn extract_image(&self, path: &Path) -> Result<String, ExtractionError> {
        if !self.ocr_enabled {
            return Err(ExtractionError::OcrDisabled(path.display().to_string()));
        }
        debug!("OCR on image {} via {}", path.display(), self.ocr.name());
        Ok(self.ocr.run_ocr(path)?)
    }

    fn extract_pdf(&self, path: &Path) -> Result<String, ExtractionError> {
        let pages = self.pdf.page_texts(path)?;
        let text = pages.join("\n").trim().to_string();
        if !text.is_empty() {
            debug!("Using text layer of {} ({} page(s))", path.display(), pages.len());
            return Ok(text);
        }

        if !self.ocr_enabled {
            warn!("{} has no text layer and OCR is disabled", path.display());
            return Ok(text);
        }

        info!("{} has no text layer, running OCR", path.display());
        self.ocr_pdf(path)
    }

    fn ocr_pdf(&self, path: &Path) -> Result<String, ExtractionError> {
        let temp_dir = TempDir::new()?;
        let images = self
            .pdf
            .rasterize(path, self.max_pages, self.dpi, temp_dir.path())?;
        if images.is_empty() {
            return Err(PdfError::Failed(format!(
                "no pages rendered from {}",
                path.display()
            ))
            .into());
        }

        let mut texts = Vec::with_capacity(images.len());
        let mut last_error = None;
        for (i, image) in images.iter().take(self.max_pages as usize).enumerate() {
            match self.ocr.run_ocr(image) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!("OCR failed for page {} of {}: {}", i + 1, path.display(), e);
                    last_error = Some(e);
                }
            }
        }

        match (texts.is_empty(), last_error) {
            (true, Some(e)) => Err(e.into()),
            _ => Ok(texts.join("\n")),
        }
    }

    /// Availability of the external tools, for `docscan check`.
    pub fn check_tools(&self) -> Vec<(String, bool)> {
        let mut tools: Vec<(String, bool)> = self
            .pdf
            .required_tools()
            .iter()
            .map(|tool| (tool.to_string(), check_binary(tool)))
            .collect();
        tools.push((self.ocr.name().to_string(), self.ocr.is_available()));
        tools
    }
}

impl TextSource for TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, TextSourceError> {
        Ok(self.extract(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Returns the image file name as text; fails for names containing "bad".
    #[derive(Default)]
    struct FakeOcr {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl OcrBackend for FakeOcr {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn run_ocr(&self, image_path: &Path) -> Result<String, OcrError> {
            self.calls.lock().unwrap().push(image_path.to_path_buf());
            let name = image_path.file_name().unwrap().to_string_lossy().into_owned();
            if name.contains("bad") {
                return Err(OcrError::OcrFailed("unreadable".to_string()));
            }
            Ok(format!("text of {}", name))
        }
    }

    struct FakePdf {
        pages: Vec<String>,
        total_pages: u32,
        image_prefix: &'static str,
    }

    impl FakePdf {
        fn with_text(pages: &[&str]) -> Self {
            Self {
                pages: pages.iter().map(|p| p.to_string()).collect(),
                total_pages: pages.len() as u32,
                image_prefix: "page",
            }
        }

        fn scanned(total_pages: u32) -> Self {
            Self {
                pages: vec!["  \n".to_string(); total_pages as usize],
                total_pages,
                image_prefix: "page",
            }
        }
    }

    impl PdfToolkit for FakePdf {
        fn page_texts(&self, _pdf_path: &Path) -> Result<Vec<String>, PdfError> {
            Ok(self.pages.clone())
        }

        fn rasterize(
            &self,
            _pdf_path: &Path,
            max_pages: u32,
            _dpi: u32,
            out_dir: &Path,
        ) -> Result<Vec<PathBuf>, PdfError> {
            Ok((1..=self.total_pages.min(max_pages))
                .map(|n| out_dir.join(format!("{}-{}.png", self.image_prefix, n)))
                .collect())
        }
    }

    fn extractor(settings: &OcrSettings, pdf: FakePdf) -> (TextExtractor, Arc<FakeOcr>) {
        let ocr = Arc::new(FakeOcr::default());
        let extractor = TextExtractor::with_backends(settings, ocr.clone(), Arc::new(pdf));
        (extractor, ocr)
    }

    #[test]
    fn test_pdf_with_text_layer_never_ocrs() {
        let (extractor, ocr) = extractor(
            &OcrSettings::default(),
            FakePdf::with_text(&["Rechnung Nr. 1\n", "Seite 2\n"]),
        );
        let text = extractor.extract(Path::new("invoice.pdf")).unwrap();
        assert_eq!(text, "Rechnung Nr. 1\n\nSeite 2");
        assert!(ocr.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_scanned_pdf_ocrs_at_most_max_pages() {
        let settings = OcrSettings {
            max_pages: 3,
            ..OcrSettings::default()
        };
        let (extractor, ocr) = extractor(&settings, FakePdf::scanned(8));
        let text = extractor.extract(Path::new("scan.PDF")).unwrap();
        assert_eq!(ocr.calls.lock().unwrap().len(), 3);
        assert_eq!(text, "text of page-1.png\ntext of page-2.png\ntext of page-3.png");
    }

    #[test]
    fn test_scanned_pdf_skips_failed_pages() {
        let mut pdf = FakePdf::scanned(1);
        pdf.image_prefix = "bad";
        let (extractor, _) = extractor(&OcrSettings::default(), pdf);
        let err = extractor.extract(Path::new("scan.pdf")).unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
    }

    #[test]
    fn test_image_is_ocrd_directly() {
        let (extractor, ocr) = extractor(&OcrSettings::default(), FakePdf::with_text(&[]));
        let text = extractor.extract(Path::new("/in/receipt.JPG")).unwrap();
        assert_eq!(text, "text of receipt.JPG");
        assert_eq!(ocr.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_ocr_disabled() {
        let settings = OcrSettings {
            enabled: false,
            ..OcrSettings::default()
        };
        let (extractor, ocr) = extractor(&settings, FakePdf::scanned(2));

        let err = extractor.extract(Path::new("photo.png")).unwrap_err();
        assert!(matches!(err, ExtractionError::OcrDisabled(_)));

        assert_eq!(extractor.extract(Path::new("scan.pdf")).unwrap(), "");
        assert!(ocr.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let (extractor, _) = extractor(&OcrSettings::default(), FakePdf::with_text(&[]));
        let err = extractor.extract_text(Path::new("notes.docx")).unwrap_err();
        assert!(matches!(err, TextSourceError::Unsupported(ext) if ext == "docx"));
    }
}
