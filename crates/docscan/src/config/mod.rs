//! Configuration file support.
//!
//! Reads `docscan.toml`, `docscan.yaml` or `docscan.json`; the format is
//! chosen by file extension. Relative paths resolve against the config
//! file's directory.

mod sections;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use sections::{
    CalendarConfig, GraphConfig, HotfolderConfig, OcrSettings, OneDriveConfig, StabilityConfig,
};

use crate::llm::LlmConfig;

/// Config filenames tried during discovery, in order.
pub const CONFIG_FILENAMES: &[&str] = &["docscan.toml", "docscan.yaml", "docscan.yml", "docscan.json"];

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config file found (tried {0})")]
    NotFound(String),
}

/// Full service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// IANA zone used for calendar events.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Default log filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub hotfolder: HotfolderConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub onedrive: OneDriveConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Path of the file this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Config with defaults everywhere except the folders.
    pub fn with_hotfolder(hotfolder: HotfolderConfig) -> Self {
        Self {
            timezone: default_timezone(),
            log_level: default_log_level(),
            hotfolder,
            stability: StabilityConfig::default(),
            ocr: OcrSettings::default(),
            llm: LlmConfig::default(),
            graph: GraphConfig::default(),
            onedrive: OneDriveConfig::default(),
            calendar: CalendarConfig::default(),
            source_path: None,
        }
    }

    /// Load, resolve paths and apply environment overrides.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config = Self::parse(&contents, ext)?;

        config.source_path = Some(path.to_path_buf());
        let base_dir = config.base_dir().unwrap_or_else(|| PathBuf::from("."));
        config.resolve_paths(&base_dir);
        config.graph = config.graph.with_env_overrides();
        config.llm = config.llm.with_env_overrides();

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    /// Find a config file: the working directory first, then the user's
    /// config directory (`~/.config/docscan/`).
    pub fn discover() -> Result<PathBuf, ConfigError> {
        let mut tried = Vec::new();
        let mut dirs_to_try = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            dirs_to_try.push(config_dir.join("docscan"));
        }

        for dir in dirs_to_try {
            for name in CONFIG_FILENAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
                tried.push(candidate.display().to_string());
            }
        }
        Err(ConfigError::NotFound(tried.join(", ")))
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
        let raw = path.to_string_lossy();
        let expanded = shellexpand::tilde(raw.as_ref());
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let h = &mut self.hotfolder;
        h.input_dir = Self::resolve_path(&h.input_dir, base_dir);
        h.processed_dir = Self::resolve_path(&h.processed_dir, base_dir);
        h.failed_dir = Self::resolve_path(&h.failed_dir, base_dir);
        h.archive_dir = Self::resolve_path(&h.archive_dir, base_dir);
        if let Some(schema) = self.llm.schema_path.take() {
            self.llm.schema_path = Some(Self::resolve_path(&schema, base_dir));
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in self.hotfolder.all() {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("hotfolder.{} is empty", name)));
            }
        }

        let input = &self.hotfolder.input_dir;
        for (name, path) in self.hotfolder.all().into_iter().skip(1) {
            if path == input.as_path() {
                return Err(ConfigError::Invalid(format!(
                    "hotfolder.{} must differ from hotfolder.input_dir",
                    name
                )));
            }
        }

        if self.stability.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "stability.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.ocr.max_pages == 0 || self.ocr.dpi == 0 {
            return Err(ConfigError::Invalid(
                "ocr.max_pages and ocr.dpi must be greater than 0".to_string(),
            ));
        }

        if self.calendar.parsed_time().is_none() {
            return Err(ConfigError::Invalid(format!(
                "calendar.default_time '{}' is not HH:MM",
                self.calendar.default_time
            )));
        }

        if self.graph.enabled
            && self
                .graph
                .client_id
                .as_deref()
                .map_or(true, |id| id.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "graph.client_id is required; set graph.enabled = false to run without Graph"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Create the four hot-folder directories.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (_, path) in self.hotfolder.all() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Serialise the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            format: "TOML",
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_CONFIG: &str = r#"
timezone = "Europe/Vienna"

[hotfolder]
input_dir = "scans/in"
processed_dir = "scans/processed"
failed_dir = "/srv/failed"
archive_dir = "scans/archive"

[stability]
timeout_secs = 10

[ocr]
language = "deu+eng"

[llm]
enabled = false

[graph]
enabled = false
"#;

    fn valid() -> Config {
        let mut config = Config::with_hotfolder(HotfolderConfig::under(Path::new("/srv/docs")));
        config.graph.enabled = false;
        config
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config = Config::parse(TOML_CONFIG, "toml").unwrap();
        assert_eq!(config.timezone, "Europe/Vienna");
        assert_eq!(config.stability.timeout_secs, 10);
        assert_eq!(config.stability.poll_interval_ms, 500);
        assert_eq!(config.ocr.language, "deu+eng");
        assert_eq!(config.ocr.max_pages, 5);
        assert!(!config.llm.enabled);
        assert_eq!(config.calendar.default_time, "09:00");
        assert_eq!(config.onedrive.base_path, "/Dokumente");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_example_config_is_valid() {
        let example = include_str!("../../../../config/docscan.example.toml");
        let config = Config::parse(example, "toml").unwrap();
        config.validate().unwrap();
        assert_eq!(config, Config::parse(&config.to_toml().unwrap(), "toml").unwrap());
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "hotfolder:\n  input_dir: a\n  processed_dir: b\n  failed_dir: c\n  archive_dir: d\n";
        let config = Config::parse(yaml, "yml").unwrap();
        assert_eq!(config.hotfolder.input_dir, PathBuf::from("a"));

        let json = r#"{"hotfolder": {"input_dir": "a", "processed_dir": "b", "failed_dir": "c", "archive_dir": "d"}}"#;
        let config = Config::parse(json, "json").unwrap();
        assert_eq!(config.hotfolder.archive_dir, PathBuf::from("d"));
    }

    #[test]
    fn test_missing_hotfolder_is_parse_error() {
        let err = Config::parse("timezone = \"UTC\"", "toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "TOML", .. }));
    }

    #[tokio::test]
    async fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docscan.toml");
        std::fs::write(&path, TOML_CONFIG).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.hotfolder.input_dir, dir.path().join("scans/in"));
        assert_eq!(config.hotfolder.failed_dir, PathBuf::from("/srv/failed"));
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        valid().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_input_reused_as_output() {
        let mut config = valid();
        config.hotfolder.archive_dir = config.hotfolder.input_dir.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("archive_dir"));
    }

    #[test]
    fn test_validate_rejects_zero_poll_and_bad_time() {
        let mut config = valid();
        config.stability.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.calendar.default_time = "9 Uhr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ocr_pages_and_dpi() {
        let mut config = valid();
        config.ocr.max_pages = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = valid();
        config.ocr.dpi = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = valid();
        config.ocr.max_pages = 1;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_graph_client_id_when_enabled() {
        let mut config = valid();
        config.graph.enabled = true;
        assert!(config.validate().is_err());
        config.graph.client_id = Some("client".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_authority_url() {
        let mut graph = GraphConfig::default();
        assert_eq!(graph.authority_url(), "https://login.microsoftonline.com/common");
        graph.tenant_id = Some("contoso".to_string());
        assert_eq!(graph.authority_url(), "https://login.microsoftonline.com/contoso");
        graph.authority = Some("https://login.example/".to_string());
        assert_eq!(graph.authority_url(), "https://login.example");
    }

    #[test]
    fn test_ensure_directories_and_toml_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_hotfolder(HotfolderConfig::under(dir.path()));
        config.graph.enabled = false;
        config.ensure_directories().unwrap();
        assert!(config.hotfolder.failed_dir.is_dir());

        let toml = config.to_toml().unwrap();
        let reparsed = Config::parse(&toml, "toml").unwrap();
        assert_eq!(reparsed.hotfolder, config.hotfolder);
    }
}
