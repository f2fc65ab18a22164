//! `pawbook config`: show the effective configuration.

use std::path::Path;

use anyhow::Result;
use console::style;

use pawbook_infra::filesystem::config_path;
use pawbook_types::config::PawbookConfig;

/// Print the configuration with the API key redacted.
pub fn show_config(config: &PawbookConfig, data_dir: &Path, json: bool) -> Result<()> {
    let redacted = redacted(config);

    if json {
        let output = serde_json::json!({
            "data_dir": data_dir.display().to_string(),
            "config": redacted,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!(
        "  {}  {}",
        style("Data dir:").bold(),
        style(data_dir.display()).dim()
    );
    println!(
        "  {}  {}",
        style("Config file:").bold(),
        style(config_path(data_dir).display()).dim()
    );
    println!();
    println!("{}", toml::to_string_pretty(&redacted)?);

    Ok(())
}

fn redacted(config: &PawbookConfig) -> PawbookConfig {
    PawbookConfig {
        backend: config.backend.redacted(),
        ..config.clone()
    }
}
