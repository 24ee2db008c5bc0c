//! Tool and configuration check.

use console::style;

use docscan::config::{Config, OcrSettings};
use docscan::extraction::ExtractionSchema;
use docscan::llm::LlmClient;
use docscan_analysis::TextExtractor;

use crate::cli::icons::{error, success, warn};

/// Report external tools, config validity and remote settings.
pub async fn cmd_check(loaded: anyhow::Result<Config>) -> anyhow::Result<()> {
    let mut problems = 0usize;

    println!("\n{}", style("External Tools").bold());
    println!("{}", "-".repeat(50));
    let ocr_settings = loaded
        .as_ref()
        .map(|c| c.ocr.clone())
        .unwrap_or_else(|_| OcrSettings::default());
    let extractor = TextExtractor::from_settings(&ocr_settings);
    for (tool, available) in extractor.check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            problems += 1;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }
    if !extractor.ocr_backend().is_available() {
        println!("  {}", style(extractor.ocr_backend().availability_hint()).dim());
    }

    println!("\n{}", style("Configuration").bold());
    println!("{}", "-".repeat(50));
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            println!("  {} {:#}", error(), e);
            anyhow::bail!("configuration could not be loaded");
        }
    };
    if let Some(path) = &config.source_path {
        println!("  {:<15} {}", "file", path.display());
    }
    match config.validate() {
        Ok(()) => println!("  {} valid", success()),
        Err(e) => {
            problems += 1;
            println!("  {} {}", error(), e);
        }
    }
    for (name, path) in config.hotfolder.all() {
        let marker = if path.is_dir() { success() } else { warn() };
        println!("  {} {:<14} {}", marker, name, path.display());
    }
    match ExtractionSchema::load(config.llm.schema_path.as_deref()) {
        Ok(_) => println!(
            "  {} schema {}",
            success(),
            config
                .llm
                .schema_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(bundled)".to_string())
        ),
        Err(e) => {
            problems += 1;
            println!("  {} schema: {}", error(), e);
        }
    }

    println!("\n{}", style("Structured Extraction").bold());
    println!("{}", "-".repeat(50));
    if config.llm.enabled {
        println!(
            "  {:<15} {} / {}",
            "provider",
            config.llm.provider.as_str(),
            config.llm.model
        );
        println!("  {:<15} {}", "endpoint", config.llm.endpoint);
        if config.llm.resolve_api_key().is_none() {
            println!(
                "  {} no API key (set llm.api_key or {})",
                warn(),
                config.llm.api_key_env
            );
        }
        let reachable = match LlmClient::new(config.llm.clone()) {
            Ok(client) => client.is_available().await,
            Err(_) => false,
        };
        if reachable {
            println!("  {} endpoint reachable", success());
        } else {
            problems += 1;
            println!("  {} endpoint not reachable", error());
        }
    } else {
        println!("  {} disabled, minimal records only", warn());
    }

    println!("\n{}", style("Remote Archive").bold());
    println!("{}", "-".repeat(50));
    if config.graph.enabled {
        println!("  {:<15} {}", "authority", config.graph.authority_url());
        println!("  {:<15} {}", "onedrive", config.onedrive.base_path);
        println!(
            "  {:<15} {}",
            "calendar",
            config.calendar.calendar_id.as_deref().unwrap_or("(default)")
        );
    } else {
        println!("  {} Graph disabled, reports stay local", warn());
    }

    println!();
    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    println!("{} Ready", success());
    Ok(())
}
