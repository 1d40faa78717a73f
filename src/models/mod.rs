//! Data models module
//!
//! Defines core data structures:
//! - MonitorConfiguration: everything the polling loop needs, resolved from
//!   defaults, config file, environment and CLI
//! - OutputFormat: human or JSON lines
//! - FileAccessEvent: canonical record of one reported event
//! - MonitorSummary: counters reported when monitoring stops
//! - ConfigError: validation failures for configuration values

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_MOUNT_POINT, POLL_INTERVAL_MAX_MS, POLL_INTERVAL_MIN_MS};
use crate::fanotify::{Decision, EventMask, InitFlags, InitOptions, MarkScope, NotificationClass};

#[cfg(test)]
mod tests;

/// How detected events are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `PID:<n> <path>` lines
    #[default]
    Human,
    /// One JSON object per line
    Json,
}

/// Fully resolved configuration for one watcher
#[derive(Debug, Clone)]
pub struct MonitorConfiguration {
    /// Path whose mount (or filesystem, or inode) is watched
    pub mount_point: PathBuf,
    /// Scope of the mark placed on `mount_point`
    pub scope: MarkScope,
    /// Events registered with the kernel and reported
    pub events: EventMask,
    /// Output format
    pub format: OutputFormat,
    /// Suppress startup banner and shutdown summary
    pub quiet: bool,
    /// Glob patterns; events on matching paths are not reported
    pub exclude: Vec<String>,
    /// Additional process ids whose events are discarded
    pub skip_pids: Vec<i32>,
    /// Report events caused by this process too
    pub include_self: bool,
    /// Look up the process name of each reporter
    pub show_process: bool,
    /// Upper bound on how long the loop blocks before checking for shutdown
    pub poll_interval: Duration,
    /// Verdict sent for permission events
    pub permission_decision: Decision,
    /// Open the stream with `FAN_NONBLOCK`
    pub nonblocking: bool,
    /// Remove the kernel queue limit
    pub unlimited_queue: bool,
    /// Remove the mark limit
    pub unlimited_marks: bool,
}

impl Default for MonitorConfiguration {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from(DEFAULT_MOUNT_POINT),
            scope: MarkScope::Mount,
            events: EventMask::MODIFY | EventMask::CLOSE_WRITE,
            format: OutputFormat::Human,
            quiet: false,
            exclude: Vec::new(),
            skip_pids: Vec::new(),
            include_self: false,
            show_process: false,
            poll_interval: Duration::from_millis(250),
            permission_decision: Decision::Allow,
            nonblocking: true,
            unlimited_queue: true,
            unlimited_marks: true,
        }
    }
}

impl MonitorConfiguration {
    /// Checks cross-field invariants after all layers were merged
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events.is_empty() {
            return Err(ConfigError::NoEvents);
        }
        if self.mount_point.as_os_str().is_empty() {
            return Err(ConfigError::EmptyMountPoint);
        }
        validate_poll_interval(self.poll_interval.as_millis() as u64)?;
        for pattern in &self.exclude {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidExclude {
                pattern: pattern.clone(),
                reason: e.msg.to_string(),
            })?;
        }
        Ok(())
    }

    /// Options for `fanotify_init`. Permission events need the content class.
    pub fn init_options(&self) -> InitOptions {
        let mut flags = InitFlags::CLOEXEC;
        flags.set(InitFlags::NONBLOCK, self.nonblocking);
        flags.set(InitFlags::UNLIMITED_QUEUE, self.unlimited_queue);
        flags.set(InitFlags::UNLIMITED_MARKS, self.unlimited_marks);

        let class = if self.events.is_permission() {
            NotificationClass::Content
        } else {
            NotificationClass::Notify
        };

        InitOptions {
            flags,
            class,
            ..InitOptions::default()
        }
    }

    /// Process ids the channel should discard, including our own unless
    /// `include_self` is set
    pub fn effective_skip_pids(&self, own_pid: i32) -> Vec<i32> {
        let mut pids = self.skip_pids.clone();
        if !self.include_self && !pids.contains(&own_pid) {
            pids.push(own_pid);
        }
        pids
    }
}

/// Validates a poll interval given in milliseconds
pub fn validate_poll_interval(millis: u64) -> Result<Duration, ConfigError> {
    if !(POLL_INTERVAL_MIN_MS..=POLL_INTERVAL_MAX_MS).contains(&millis) {
        return Err(ConfigError::InvalidInterval(millis));
    }
    Ok(Duration::from_millis(millis))
}

/// Parses a list of event names into one mask
pub fn parse_event_names<I, S>(names: I) -> Result<EventMask, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut mask = EventMask::empty();
    for name in names {
        let name = name.as_ref();
        mask |= EventMask::from_event_name(name).ok_or_else(|| ConfigError::UnknownEvent(name.to_string()))?;
    }
    Ok(mask)
}

/// Custom error types for configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Note: bounds must match POLL_INTERVAL_MIN_MS/MAX_MS in constants.rs
    #[error("Invalid polling interval: {0}ms. Must be between 10 and 60000 milliseconds")]
    InvalidInterval(u64),
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),
    #[error("Unknown mark scope: {0}. Expected inode, mount or filesystem")]
    UnknownScope(String),
    #[error("Unknown output format: {0}. Expected human or json")]
    UnknownFormat(String),
    #[error("Unknown permission decision: {0}. Expected allow or deny")]
    UnknownDecision(String),
    #[error("Invalid exclude pattern {pattern:?}: {reason}")]
    InvalidExclude { pattern: String, reason: String },
    #[error("At least one event must be selected")]
    NoEvents,
    #[error("Mount point must not be empty")]
    EmptyMountPoint,
}

/// Canonical structure for one reported event.
/// Used by both the human and the JSON formatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAccessEvent {
    /// ISO 8601 timestamp of when the event was read
    pub timestamp: String,
    /// Id of the process that touched the file
    pub pid: i32,
    /// Absolute path of the file
    pub path: String,
    /// Names of the configured events that matched
    pub events: Vec<String>,
    /// Process name, when enrichment is enabled and the process still exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    /// Modification time of the file, ISO 8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
}

/// Counters for one monitoring session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSummary {
    /// Records decoded into events
    pub events: u64,
    /// Lines written to the output sink
    pub emitted: u64,
    /// Events dropped by exclusion or classification
    pub skipped: u64,
    /// Diagnostics written to the error sink
    pub errors: u64,
    /// Permission responses written
    pub responses: u64,
}
