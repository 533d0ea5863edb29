use super::schemas::{section_fields, Config};
/// Configuration utilities - loading, validation and access helpers
///
/// - Loading configuration from disk (defaults when the file is missing)
/// - Unknown-key detection so typos in config.toml are reported
/// - Thread-safe access helpers
/// - Writing the default or current configuration back to disk
use crate::errors::{ConfigurationError, EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// Global configuration instance
///
/// Filled by `load_config*`. Readers before that see the defaults.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

fn global() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::default()))
}

/// Load the configuration from the data directory and install it globally
pub fn load_config() -> EngineResult<Config> {
    load_config_from_path(&crate::paths::get_config_path())
}

/// Load configuration from a specific file path
///
/// A missing file yields the defaults. Parse and validation failures are
/// returned as `Configuration` errors. The loaded config replaces the global one.
pub fn load_config_from_path(path: &Path) -> EngineResult<Config> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SwapEngineError::configuration_error(
                path.display().to_string(),
                format!("failed to read: {}", e),
            )
        })?;
        let config = parse_config(&contents)?;
        logger::info(
            LogTag::Config,
            &format!("Loaded configuration from {}", path.display()),
        );
        config
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file {} not found, using default values", path.display()),
        );
        Config::default()
    };

    *global().write() = config.clone();
    Ok(config)
}

/// Parse and validate TOML contents without touching the global config
pub fn parse_config(contents: &str) -> EngineResult<Config> {
    for warning in unknown_keys(contents)? {
        logger::warning(LogTag::Config, &warning);
    }

    let config = toml::from_str::<Config>(contents)
        .map_err(|e| SwapEngineError::parse_error("config TOML", e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Keys present in the TOML that no config section declares
pub fn unknown_keys(contents: &str) -> EngineResult<Vec<String>> {
    let value = toml::from_str::<toml::Value>(contents)
        .map_err(|e| SwapEngineError::parse_error("config TOML", e.to_string()))?;

    let mut unknown = Vec::new();
    let Some(root) = value.as_table() else {
        return Ok(unknown);
    };

    for (section, body) in root {
        if !Config::FIELDS.contains(&section.as_str()) {
            unknown.push(format!("Unknown config section '{}'", section));
            continue;
        }
        let (Some(fields), Some(table)) = (section_fields(section), body.as_table()) else {
            continue;
        };
        for key in table.keys() {
            if !fields.contains(&key.as_str()) {
                unknown.push(format!("Unknown config key '{}.{}'", section, key));
            }
        }
    }

    Ok(unknown)
}

/// Execute a function with read access to the configuration
///
/// ```
/// use swapengine::config::with_config;
///
/// let deadline = with_config(|cfg| cfg.swaps.deadline_secs);
/// assert!(deadline > 0);
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config = global().read();
    f(&config)
}

/// Clone of the entire configuration, for holding across await points
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Replace the global configuration after validating it
pub fn set_config(config: Config) -> EngineResult<()> {
    config.validate()?;
    *global().write() = config;
    Ok(())
}

/// Save the current configuration to disk (default: data directory)
pub fn save_config(path: Option<&Path>) -> EngineResult<PathBuf> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::paths::get_config_path);
    let config = get_config_clone();
    write_config(&config, &path)?;
    Ok(path)
}

/// Write a default config file; refuses to overwrite unless `force`
pub fn write_default_config(path: &Path, force: bool) -> EngineResult<()> {
    if path.exists() && !force {
        return Err(SwapEngineError::configuration_error(
            path.display().to_string(),
            "file already exists (use --force to overwrite)",
        ));
    }
    write_config(&Config::default(), path)
}

fn write_config(config: &Config, path: &Path) -> EngineResult<()> {
    let contents = to_toml(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            SwapEngineError::configuration_error(
                parent.display().to_string(),
                format!("failed to create directory: {}", e),
            )
        })?;
    }
    std::fs::write(path, contents).map_err(|e| {
        SwapEngineError::configuration_error(
            path.display().to_string(),
            format!("failed to write: {}", e),
        )
    })?;
    logger::info(
        LogTag::Config,
        &format!("Wrote configuration to {}", path.display()),
    );
    Ok(())
}

pub fn to_toml(config: &Config) -> EngineResult<String> {
    toml::to_string_pretty(config).map_err(|e| {
        SwapEngineError::Configuration(ConfigurationError::Generic {
            message: format!("Failed to serialize config: {}", e),
        })
    })
}
