/// Logger runtime configuration built from command-line flags
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments::get_cmd_args;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    /// Tags with debug output enabled
    pub debug_tags: HashSet<LogTag>,
    /// Tags with verbose output enabled
    pub verbose_tags: HashSet<LogTag>,
    /// When non-empty, only these tags are printed (errors excluded)
    pub enabled_tags: HashSet<LogTag>,
    pub console_enabled: bool,
    pub file_enabled: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            verbose_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            console_enabled: true,
            file_enabled: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

/// Build the logger configuration from the process arguments
///
/// Recognized flags: `--quiet`, `--verbose`, `--verbose-<tag>`,
/// `--debug-<tag>`, `--debug-all`, `--only-<tag>`, `--no-log-file`.
pub fn init_from_args() {
    set_logger_config(config_from_args(&get_cmd_args()));
}

pub(crate) fn config_from_args(args: &[String]) -> LoggerConfig {
    let mut config = LoggerConfig::default();

    for arg in args {
        match arg.as_str() {
            "--quiet" => config.min_level = LogLevel::Warning,
            "--verbose" => config.min_level = LogLevel::Verbose,
            "--no-log-file" => config.file_enabled = false,
            "--debug-all" => {
                config.debug_tags.extend(LogTag::ALL);
                if config.min_level < LogLevel::Debug {
                    config.min_level = LogLevel::Debug;
                }
            }
            other => {
                if let Some(key) = other.strip_prefix("--debug-") {
                    if let Some(tag) = LogTag::from_debug_key(key) {
                        config.debug_tags.insert(tag);
                        if config.min_level < LogLevel::Debug {
                            config.min_level = LogLevel::Debug;
                        }
                    }
                } else if let Some(key) = other.strip_prefix("--verbose-") {
                    if let Some(tag) = LogTag::from_debug_key(key) {
                        config.verbose_tags.insert(tag);
                        config.debug_tags.insert(tag);
                        if config.min_level < LogLevel::Debug {
                            config.min_level = LogLevel::Debug;
                        }
                    }
                } else if let Some(key) = other.strip_prefix("--only-") {
                    if let Some(tag) = LogTag::from_debug_key(key) {
                        config.enabled_tags.insert(tag);
                    }
                }
            }
        }
    }

    config
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().debug_tags.contains(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_debug_flags_enable_tags() {
        let config = config_from_args(&args(&["swapengine", "--debug-swap", "--debug-gas"]));
        assert!(config.debug_tags.contains(&LogTag::Swap));
        assert!(config.debug_tags.contains(&LogTag::Gas));
        assert!(!config.debug_tags.contains(&LogTag::Rpc));
        assert_eq!(config.min_level, LogLevel::Debug);
    }

    #[test]
    fn test_quiet_and_verbose() {
        assert_eq!(
            config_from_args(&args(&["swapengine", "--quiet"])).min_level,
            LogLevel::Warning
        );
        let verbose = config_from_args(&args(&["swapengine", "--verbose-rpc"]));
        assert!(verbose.verbose_tags.contains(&LogTag::Rpc));
        assert!(verbose.debug_tags.contains(&LogTag::Rpc));
    }

    #[test]
    fn test_unknown_debug_flag_ignored() {
        let config = config_from_args(&args(&["swapengine", "--debug-nothing"]));
        assert!(config.debug_tags.is_empty());
        assert_eq!(config.min_level, LogLevel::Info);
    }
}
