//! Log formatting with ANSI colors and text wrapping
//!
//! Console lines are colored and wrapped; file lines are plain and carry the
//! full date.

use super::config::LoggerConfig;
use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 8;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(config: &LoggerConfig, tag: LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let prefix_width = time.len() + 1 + TAG_WIDTH + LEVEL_WIDTH + 6;
    let available = MAX_LINE_LENGTH.saturating_sub(prefix_width).max(40);
    let chunks = wrap_text(message, available);

    if config.console_enabled {
        let base = format!(
            "{} [{}] [{}] ",
            time.dimmed(),
            format_tag(&tag),
            format_level(level)
        );
        let continuation = " ".repeat(prefix_width);
        for (index, chunk) in chunks.iter().enumerate() {
            if index == 0 {
                print_stdout_safe(&format!("{}{}", base, chunk));
            } else {
                print_stdout_safe(&format!("{}{}", continuation, chunk));
            }
        }
    }

    if config.file_enabled {
        for chunk in &chunks {
            write_to_file(&format!(
                "{} [{}] [{}] {}",
                timestamp,
                tag.label(),
                level.as_str(),
                chunk
            ));
        }
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.label(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Config => padded.bright_white().bold(),
        LogTag::Swap => padded.bright_magenta().bold(),
        LogTag::Router => padded.bright_blue().bold(),
        LogTag::Route => padded.bright_cyan().bold(),
        LogTag::Gas => padded.yellow().bold(),
        LogTag::Liquidity => padded.bright_green().bold(),
        LogTag::Slippage => padded.bright_red().bold(),
        LogTag::Simulation => padded.cyan().bold(),
        LogTag::Rpc => padded.blue().bold(),
        LogTag::Wallet => padded.magenta().bold(),
        LogTag::Test => padded.white().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => padded.bright_red().bold(),
        LogLevel::Warning => padded.bright_yellow().bold(),
        LogLevel::Info => padded.bright_green(),
        LogLevel::Debug => padded.bright_blue(),
        LogLevel::Verbose => padded.dimmed(),
    }
}

/// Print to stdout but exit quietly on a broken pipe
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
}

/// Wrap text at word boundaries, respecting existing newlines
pub(crate) fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_width) {
                    result.push(piece.iter().collect());
                }
            } else if current.is_empty() {
                current = word.to_string();
            } else if current_len + word_len + 1 <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}
