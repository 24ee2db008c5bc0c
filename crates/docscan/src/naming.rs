//! Canonical, filesystem-safe report filenames.
//!
//! Grammar:
//!
//! ```text
//! <date|0000-00-00>__<type>__<issuer>__<amount|0.00>__faellig_<due|none>__tax_<Y|N>[__v<n>].pdf
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::ExtractedData;

/// Default maximum length of a sanitised component.
pub const DEFAULT_MAX_COMPONENT_LEN: usize = 60;

/// Substitute for components that sanitise to nothing.
pub const PLACEHOLDER: &str = "unbekannt";

const SEPARATOR: &str = "__";
const MISSING_DATE: &str = "0000-00-00";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));
static DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

/// Reduce a free-text component to `[A-Za-z0-9._-]`.
///
/// Spaces are dropped outright, other disallowed runs become a single `-`,
/// edge dashes are stripped and the result is cut to `max_len`.
pub fn sanitize_component(component: &str, max_len: usize) -> String {
    let without_spaces = component.trim().replace(' ', "");
    let replaced = DISALLOWED.replace_all(&without_spaces, "-");
    let collapsed = DASH_RUNS.replace_all(&replaced, "-");

    // Only ASCII survives the substitution, so byte truncation is safe.
    let mut cut = collapsed.trim_matches('-').to_string();
    cut.truncate(max_len);
    let cut = cut.trim_matches('-');

    if cut.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        cut.to_string()
    }
}

/// Builds canonical filenames from extracted records.
#[derive(Debug, Clone, Copy)]
pub struct FilenameBuilder {
    max_component_len: usize,
}

impl Default for FilenameBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPONENT_LEN)
    }
}

impl FilenameBuilder {
    pub fn new(max_component_len: usize) -> Self {
        Self { max_component_len }
    }

    pub fn sanitize(&self, component: &str) -> String {
        sanitize_component(component, self.max_component_len)
    }

    /// Canonical filename for `record`. `version` > 1 appends `__v<n>`.
    pub fn build(&self, record: &ExtractedData, version: u32) -> String {
        let date = record
            .document_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| MISSING_DATE.to_string());
        let due = record
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "none".to_string());
        let amount = format!("{:.2}", record.amount_total.unwrap_or(0.0));
        let tax = if record.is_tax_relevant { "Y" } else { "N" };

        let parts = [
            date,
            self.sanitize(&record.document_type),
            self.sanitize(&record.issuer),
            amount,
            format!("faellig_{}", due),
            format!("tax_{}", tax),
        ];

        let mut name = parts.join(SEPARATOR);
        if version > 1 {
            name.push_str(&format!("{}v{}", SEPARATOR, version));
        }
        name.push_str(".pdf");
        name
    }
}

/// Return `path` if free, else the first `<stem>__v<n>.<ext>` (n >= 2)
/// that does not exist yet.
///
/// Assumes a single writer; two concurrent callers may pick the same name.
pub fn ensure_unique(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 2u32;
    loop {
        let candidate = parent.join(format!("{}{}v{}{}", stem, SEPARATOR, counter, extension));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
