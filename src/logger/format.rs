//! Log formatting and console output with ANSI colors
//!
//! Handles colorized console output with aligned tag and action columns.

use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const ACTION_WIDTH: usize = 12;

/// Format and print a log message
pub fn format_and_log(tag: LogTag, action: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let tag_str = format_tag(&tag);
    let action_str = format!("{:<width$}", action, width = ACTION_WIDTH);

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        action_str.bright_white(),
        message
    );

    print_stdout_safe(&line);
}

/// Format a tag with its subsystem color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Config => padded.yellow().bold(),
        LogTag::Classifier => padded.bright_cyan().bold(),
        LogTag::Ledger => padded.bright_green().bold(),
        LogTag::Chain => padded.bright_magenta().bold(),
        LogTag::Detector => padded.bright_blue().bold(),
        LogTag::Batch => padded.green().bold(),
        LogTag::Realtime => padded.cyan().bold(),
        LogTag::Rpc => padded.blue().bold(),
        LogTag::Database => padded.magenta().bold(),
        LogTag::Websocket => padded.bright_purple().bold(),
    }
}

/// Print to stdout, tolerating a closed pipe when output is piped
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    let _ = out.flush();
}
