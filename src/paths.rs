//! Centralized path resolution
//!
//! All file and directory paths go through this module so the CLI, tests and
//! tools agree on where configuration and logs live.
//!
//! - **macOS**: `~/Library/Application Support/SwapEngine/`
//! - **Windows**: `%LOCALAPPDATA%\SwapEngine\`
//! - **Linux**: `$XDG_DATA_HOME/SwapEngine/` (fallback `~/.local/share/SwapEngine/`)
//!
//! ```text
//! SwapEngine/
//! ├── data/
//! │   └── config.toml
//! └── logs/
//!     └── swapengine_YYYY-MM-DD.log
//! ```
//!
//! `SWAPENGINE_HOME` overrides the base directory.

use once_cell::sync::Lazy;
use std::path::PathBuf;

const APP_DIR: &str = "SwapEngine";

static BASE_DIRECTORY: Lazy<PathBuf> = Lazy::new(resolve_base_directory);

fn resolve_base_directory() -> PathBuf {
    if let Ok(dir) = std::env::var("SWAPENGINE_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(APP_DIR);
    }

    PathBuf::from(APP_DIR)
}

pub fn get_base_directory() -> PathBuf {
    BASE_DIRECTORY.clone()
}

pub fn get_data_directory() -> PathBuf {
    BASE_DIRECTORY.join("data")
}

pub fn get_logs_directory() -> PathBuf {
    BASE_DIRECTORY.join("logs")
}

pub fn get_config_path() -> PathBuf {
    get_data_directory().join("config.toml")
}

/// Create the data and logs directories. Must run before `logger::init()`.
pub fn ensure_all_directories() -> Result<(), String> {
    for dir in [get_data_directory(), get_logs_directory()] {
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_base_directory() {
        let base = get_base_directory();
        assert!(get_data_directory().starts_with(&base));
        assert!(get_logs_directory().starts_with(&base));
        assert_eq!(get_config_path().file_name().unwrap(), "config.toml");
    }
}
