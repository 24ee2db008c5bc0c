//! Tesseract OCR via the command line.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use docscan::config::OcrSettings;

use super::backend::{OcrBackend, OcrError};
use crate::tools::{check_binary, handle_cmd_output};

/// Tesseract OCR backend.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    command: String,
    language: String,
}

impl TesseractBackend {
    pub fn new(command: &str, language: &str) -> Self {
        Self {
            command: command.to_string(),
            language: language.to_string(),
        }
    }

    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self::new(&settings.tesseract_cmd, &settings.language)
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::from_settings(&OcrSettings::default())
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary(&self.command)
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("{} is available", self.command)
        } else {
            format!(
                "{} not found. Install with: apt install tesseract-ocr tesseract-ocr-{}",
                self.command,
                self.language.split('+').next().unwrap_or("deu")
            )
        }
    }

    fn run_ocr(&self, image_path: &Path) -> Result<String, OcrError> {
        debug!("{} {} (lang {})", self.command, image_path.display(), self.language);
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        Ok(handle_cmd_output(
            output,
            &format!("{} (install tesseract-ocr)", self.command),
            "tesseract failed",
        )?)
    }
}
