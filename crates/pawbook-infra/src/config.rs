//! Configuration loader for Pawbook.
//!
//! Reads `config.toml` from the data directory (`~/.pawbook/` by default)
//! and deserializes it into [`PawbookConfig`]. Falls back to defaults when
//! the file is missing or malformed, then applies environment overrides.

use std::path::Path;

use pawbook_types::config::PawbookConfig;

/// Environment variable that overrides `backend.api_key`.
pub const API_KEY_ENV: &str = "PAWBOOK_API_KEY";

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: defaults.
/// - Unreadable or unparsable file: a warning, then defaults.
/// - `PAWBOOK_API_KEY`, when set and non-empty, replaces the file's API key.
pub async fn load_config(data_dir: &Path) -> PawbookConfig {
    let config = read_config_file(data_dir).await;
    apply_env_overrides(config, std::env::var(API_KEY_ENV).ok())
}

async fn read_config_file(data_dir: &Path) -> PawbookConfig {
    let config_path = crate::filesystem::config_path(data_dir);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return PawbookConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return PawbookConfig::default();
        }
    };

    match toml::from_str::<PawbookConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            PawbookConfig::default()
        }
    }
}

/// Apply environment overrides to a loaded config.
pub fn apply_env_overrides(mut config: PawbookConfig, api_key: Option<String>) -> PawbookConfig {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.backend.api_key = Some(key.trim().to_string());
    }
    config
}
