/// Filtering rules applied before any formatting happens
use super::config::{get_logger_config, LoggerConfig};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Filtering rules:
/// 1. Errors are always shown
/// 2. Levels above the configured minimum are dropped
/// 3. Debug requires --debug-<tag> for that tag
/// 4. Verbose requires --verbose or --verbose-<tag>
/// 5. A non-empty enabled set restricts output to those tags
pub(crate) fn should_log(config: &LoggerConfig, tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    if level > config.min_level {
        return false;
    }

    if level == LogLevel::Debug && !config.debug_tags.contains(tag) {
        return false;
    }

    if level == LogLevel::Verbose
        && !(config.min_level == LogLevel::Verbose || config.verbose_tags.contains(tag))
    {
        return false;
    }

    config.enabled_tags.is_empty() || config.enabled_tags.contains(tag)
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    let config = get_logger_config();
    if !should_log(&config, &tag, level) {
        return;
    }

    super::format::format_and_log(&config, tag, level, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_always_logged() {
        let config = LoggerConfig {
            min_level: LogLevel::Error,
            ..Default::default()
        };
        assert!(should_log(&config, &LogTag::Swap, LogLevel::Error));
        assert!(!should_log(&config, &LogTag::Swap, LogLevel::Warning));
    }

    #[test]
    fn test_debug_requires_tag() {
        let mut config = LoggerConfig {
            min_level: LogLevel::Debug,
            ..Default::default()
        };
        config.debug_tags.insert(LogTag::Gas);
        assert!(should_log(&config, &LogTag::Gas, LogLevel::Debug));
        assert!(!should_log(&config, &LogTag::Swap, LogLevel::Debug));
        assert!(should_log(&config, &LogTag::Swap, LogLevel::Info));
    }

    #[test]
    fn test_enabled_tags_restrict_output() {
        let mut config = LoggerConfig::default();
        config.enabled_tags.insert(LogTag::Route);
        assert!(should_log(&config, &LogTag::Route, LogLevel::Info));
        assert!(!should_log(&config, &LogTag::Rpc, LogLevel::Info));
        assert!(should_log(&config, &LogTag::Rpc, LogLevel::Error));
    }
}
