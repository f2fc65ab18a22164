//! Data directory layout for Pawbook.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "PAWBOOK_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `PAWBOOK_DATA_DIR` environment variable
/// 2. `~/.pawbook`
pub fn resolve_data_dir() -> PathBuf {
    resolve_from(std::env::var(DATA_DIR_ENV).ok(), dirs::home_dir())
}

fn resolve_from(env_dir: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = env_dir.filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(home) = home {
        return home.join(".pawbook");
    }

    // Last resort: current directory
    PathBuf::from(".pawbook")
}

/// Path of the configuration file inside a data directory.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}
