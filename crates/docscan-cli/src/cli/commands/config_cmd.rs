//! Configuration commands.

use console::style;

use docscan::config::Config;

use crate::cli::icons::dim_arrow;

/// Print the effective configuration as TOML.
pub fn cmd_config_show(config: &Config) -> anyhow::Result<()> {
    if let Some(path) = &config.source_path {
        eprintln!("{} {}", dim_arrow(), style(path.display()).dim());
    }

    let mut shown = config.clone();
    if shown.llm.api_key.is_some() {
        shown.llm.api_key = Some("********".to_string());
    }
    print!("{}", shown.to_toml()?);
    Ok(())
}
