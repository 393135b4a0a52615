//! Console rendering and input parsing
//!
//! Every printer writes to a caller-supplied [`Write`] so the menu loop can
//! be driven against in-memory buffers in tests.

use crossterm::style::Stylize;
use std::io::{self, Write};
use tgecomm_core::validators::{validate_positive_integer, validate_recipient};
use tgecomm_core::{Dialog, MetricsSummary, SessionError};
use tgecomm_runtime::{DisplayMessage, InboundView};

/// Limit used when the user leaves the prompt blank
pub const DEFAULT_LIMIT: usize = 10;

const RULE_WIDTH: usize = 50;

// ----------------------------------------------------------------------------
// Menu
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Send,
    ViewMessages,
    ListDialogs,
    Listen,
    ShowMetrics,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Send),
            "2" => Some(MenuChoice::ViewMessages),
            "3" => Some(MenuChoice::ListDialogs),
            "4" => Some(MenuChoice::Listen),
            "5" => Some(MenuChoice::ShowMetrics),
            "0" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

pub fn print_header(out: &mut impl Write) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{}", rule.as_str().cyan())?;
    writeln!(out, "{} - Messaging Client", "TGecomm".cyan().bold())?;
    writeln!(out, "{}", rule.as_str().cyan())
}

pub fn print_menu(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{}", "Options:".bold())?;
    for line in [
        "1. Send a message",
        "2. View messages from a chat",
        "3. List dialogs",
        "4. Keep running and listen for messages",
        "5. Show metrics",
        "0. Exit",
    ] {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

pub fn print_prompt(out: &mut impl Write, label: &str) -> io::Result<()> {
    write!(out, "{}", label.cyan())?;
    out.flush()
}

// ----------------------------------------------------------------------------
// Status Lines
// ----------------------------------------------------------------------------

pub fn print_success(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "✓".green().bold(), message)
}

pub fn print_error(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "✗".red().bold(), message)
}

pub fn print_info(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "ℹ".cyan(), message)
}

pub fn print_warning(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{} {}", "⚠".yellow().bold(), message)
}

// ----------------------------------------------------------------------------
// Result Views
// ----------------------------------------------------------------------------

pub fn print_messages(
    out: &mut impl Write,
    chat: &str,
    messages: &[DisplayMessage],
) -> io::Result<()> {
    if messages.is_empty() {
        return print_info(out, &format!("No messages found in {}", chat));
    }

    writeln!(out)?;
    writeln!(out, "Last {} messages from {}:", messages.len(), chat)?;
    for entry in messages {
        writeln!(
            out,
            "[{}] {}: {}",
            entry.message.formatted_date().dark_grey(),
            entry.sender_name.as_str().cyan(),
            entry.message.body()
        )?;
    }
    Ok(())
}

pub fn print_dialogs(out: &mut impl Write, dialogs: &[Dialog]) -> io::Result<()> {
    if dialogs.is_empty() {
        return print_info(out, "No dialogs found");
    }

    writeln!(out)?;
    writeln!(out, "Your dialogs (last {}):", dialogs.len())?;
    for (index, dialog) in dialogs.iter().enumerate() {
        writeln!(out, "{}. {} (ID: {})", index + 1, dialog.name, dialog.id)?;
    }
    Ok(())
}

pub fn print_inbound(out: &mut impl Write, view: &InboundView) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "[New Message]".green().bold())?;
    writeln!(out, "From: {}", view.sender_name)?;
    writeln!(out, "Chat: {}", view.chat_name)?;
    writeln!(out, "Message: {}", view.body)
}

pub fn print_metrics(out: &mut impl Write, summary: &MetricsSummary) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=== Metrics Summary ===".bold())?;
    writeln!(out, "Uptime: {}", summary.uptime_formatted.as_str().green())?;
    writeln!(out, "Total Metrics: {}", summary.total_metrics)?;
    writeln!(out, "Errors: {}", summary.error_count)?;

    for (error_type, count) in &summary.error_types {
        writeln!(out, "  {}: {}", error_type.as_str().red(), count)?;
    }
    for (name, value) in &summary.counters {
        writeln!(out, "Counter: {}: {}", name.as_str().cyan(), value)?;
    }
    for (name, stat) in &summary.timings {
        writeln!(
            out,
            "Timing: {}: avg {:.3}s (min {:.3}s, max {:.3}s, n={})",
            name.as_str().cyan(),
            stat.avg,
            stat.min,
            stat.max,
            stat.count
        )?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Input Parsing
// ----------------------------------------------------------------------------

/// Trimmed recipient or chat, if it has a recognised format
pub fn parse_target(input: &str) -> Option<String> {
    let target = input.trim();
    if validate_recipient(target) {
        Some(target.to_string())
    } else {
        None
    }
}

/// Positive limit, or [`DEFAULT_LIMIT`] when the input is blank
pub fn parse_limit(input: &str, field_name: &str) -> Result<usize, SessionError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(DEFAULT_LIMIT);
    }
    validate_positive_integer(input, field_name)
}
