//! Configuration sections.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// The four folders the pipeline works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotfolderConfig {
    /// Watched intake folder.
    pub input_dir: PathBuf,
    /// Composed reports are written here.
    pub processed_dir: PathBuf,
    /// Sources whose run failed are moved here.
    pub failed_dir: PathBuf,
    /// Sources whose run succeeded are moved here.
    pub archive_dir: PathBuf,
}

impl HotfolderConfig {
    /// Conventional layout below a single root folder.
    pub fn under(root: &Path) -> Self {
        Self {
            input_dir: root.join("input"),
            processed_dir: root.join("processed"),
            failed_dir: root.join("failed"),
            archive_dir: root.join("archive"),
        }
    }

    pub fn all(&self) -> [(&'static str, &Path); 4] {
        [
            ("input_dir", self.input_dir.as_path()),
            ("processed_dir", self.processed_dir.as_path()),
            ("failed_dir", self.failed_dir.as_path()),
            ("archive_dir", self.archive_dir.as_path()),
        ]
    }
}

/// Timings of the write-completion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityConfig {
    #[serde(default = "default_stability_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_stability_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_stability_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl StabilityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// OCR and PDF text extraction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// When false, images cannot be read and PDFs use their text layer only.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tesseract language code(s), e.g. "deu" or "deu+eng".
    #[serde(default = "default_language")]
    pub language: String,
    /// Tesseract binary name or path.
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,
    /// Pages of a scanned PDF that get OCR'd.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Rasterisation resolution for scanned PDFs.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "deu".to_string()
}

fn default_tesseract_cmd() -> String {
    "tesseract".to_string()
}

fn default_max_pages() -> u32 {
    5
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            language: default_language(),
            tesseract_cmd: default_tesseract_cmd(),
            max_pages: default_max_pages(),
            dpi: default_dpi(),
        }
    }
}

/// Microsoft Graph application registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Overrides the authority derived from `tenant_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_scopes() -> Vec<String> {
    vec![
        "Files.ReadWrite.All".to_string(),
        "Calendars.ReadWrite".to_string(),
        "offline_access".to_string(),
    ]
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: None,
            tenant_id: None,
            authority: None,
            scopes: default_scopes(),
        }
    }
}

impl GraphConfig {
    /// Login authority: explicit, else per tenant, else `common`.
    pub fn authority_url(&self) -> String {
        if let Some(authority) = self.authority.as_deref().filter(|a| !a.is_empty()) {
            return authority.trim_end_matches('/').to_string();
        }
        let tenant = self
            .tenant_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("common");
        format!("https://login.microsoftonline.com/{}", tenant)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("GRAPH_CLIENT_ID") {
            self.client_id = Some(val);
        }
        if let Ok(val) = std::env::var("GRAPH_TENANT_ID") {
            self.tenant_id = Some(val);
        }
        self
    }
}

/// OneDrive target folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneDriveConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

fn default_base_path() -> String {
    "/Dokumente".to_string()
}

impl Default for OneDriveConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

/// Payment reminder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Target calendar; the default calendar when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
    /// Reminder start time on the due date, `HH:MM`.
    #[serde(default = "default_time")]
    pub default_time: String,
}

fn default_time() -> String {
    "09:00".to_string()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: None,
            default_time: default_time(),
        }
    }
}

impl CalendarConfig {
    pub fn parsed_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.default_time.trim(), "%H:%M").ok()
    }
}
