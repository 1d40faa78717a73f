//! Output formatting module
//!
//! Handles:
//! - Human-readable `PID:<n> <path>` lines
//! - JSON lines built from [`FileAccessEvent`]
//! - Diagnostic lines for the error stream
//! - The shutdown summary

use anyhow::Result;
use std::io::Write;
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::models::{FileAccessEvent, MonitorSummary, OutputFormat};

/// RFC 3339 timestamp for `time`; falls back to the Unix epoch text on the
/// (practically impossible) formatting failure.
pub fn format_timestamp(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Render one event in the requested format, without a trailing newline
pub fn format_event(event: &FileAccessEvent, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(format_human(event)),
        OutputFormat::Json => Ok(serde_json::to_string(event)?),
    }
}

fn format_human(event: &FileAccessEvent) -> String {
    match event.process {
        Some(ref name) => format!("PID:{} ({}) {}", event.pid, name, event.path),
        None => format!("PID:{} {}", event.pid, event.path),
    }
}

/// Write one event line to `out`
pub fn write_event<W: Write>(out: &mut W, event: &FileAccessEvent, format: OutputFormat) -> Result<()> {
    let line = format_event(event, format)?;
    writeln!(out, "{line}")?;
    out.flush()?;
    Ok(())
}

/// Write one diagnostic line to `err`
pub fn write_diagnostic<W: Write>(err: &mut W, message: &dyn std::fmt::Display) -> std::io::Result<()> {
    writeln!(err, "error: {message}")?;
    err.flush()
}

/// Human-readable summary printed when monitoring stops
pub fn format_summary(summary: &MonitorSummary) -> String {
    let mut text = String::from("Monitoring stopped.\n");
    text.push_str(&format!("  Events: {}\n", summary.events));
    text.push_str(&format!("  Reported: {}\n", summary.emitted));
    if summary.skipped > 0 {
        text.push_str(&format!("  Filtered: {}\n", summary.skipped));
    }
    if summary.responses > 0 {
        text.push_str(&format!("  Permission responses: {}\n", summary.responses));
    }
    if summary.errors > 0 {
        text.push_str(&format!("  Errors: {}\n", summary.errors));
    }
    text
}
