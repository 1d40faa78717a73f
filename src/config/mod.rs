//! Configuration management
//!
//! Builds a [`MonitorConfiguration`] from four layers, later ones winning:
//! built-in defaults, an optional TOML file, the `MOUNT_POINT` environment
//! variable and command-line overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, MOUNT_POINT_ENV};
use crate::fanotify::{Decision, MarkScope};
use crate::models::{
    parse_event_names, validate_poll_interval, ConfigError, MonitorConfiguration, OutputFormat,
};

/// On-disk configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub watch: WatchSettings,
    pub output: OutputSettings,
    pub filter: FilterSettings,
    pub channel: ChannelSettings,
}

/// What to watch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSettings {
    pub mount_point: Option<PathBuf>,
    /// `inode`, `mount` or `filesystem`
    pub scope: Option<String>,
    /// Event names such as `modify` or `close_write`
    pub events: Option<Vec<String>>,
}

/// How to report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    /// `human` or `json`
    pub format: Option<String>,
    pub quiet: Option<bool>,
    pub exclude: Vec<String>,
    pub show_process: Option<bool>,
}

/// Which processes to ignore
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSettings {
    pub skip_pids: Vec<i32>,
    pub include_self: Option<bool>,
}

/// Notification stream tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelSettings {
    pub nonblocking: Option<bool>,
    pub unlimited_queue: Option<bool>,
    pub unlimited_marks: Option<bool>,
    pub poll_interval_ms: Option<u64>,
    /// `allow` or `deny`
    pub permission_decision: Option<String>,
}

/// Values given on the command line; `None` leaves the lower layer in place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub mount_point: Option<PathBuf>,
    pub scope: Option<String>,
    pub events: Vec<String>,
    pub json: bool,
    pub quiet: bool,
    pub exclude: Vec<String>,
    pub skip_pids: Vec<i32>,
    pub include_self: bool,
    pub show_process: bool,
    pub poll_interval_ms: Option<u64>,
}

impl ConfigFile {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }

    /// `<config dir>/fanmon/config.toml`, if a config directory exists
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Apply the file's settings on top of `config`
    pub fn apply(&self, config: &mut MonitorConfiguration) -> Result<(), ConfigError> {
        if let Some(ref mount_point) = self.watch.mount_point {
            config.mount_point = mount_point.clone();
        }
        if let Some(ref scope) = self.watch.scope {
            config.scope = parse_scope(scope)?;
        }
        if let Some(ref events) = self.watch.events {
            config.events = parse_event_names(events)?;
        }

        if let Some(ref format) = self.output.format {
            config.format = parse_format(format)?;
        }
        if let Some(quiet) = self.output.quiet {
            config.quiet = quiet;
        }
        config.exclude.extend(self.output.exclude.iter().cloned());
        if let Some(show_process) = self.output.show_process {
            config.show_process = show_process;
        }

        config.skip_pids.extend(self.filter.skip_pids.iter().copied());
        if let Some(include_self) = self.filter.include_self {
            config.include_self = include_self;
        }

        if let Some(nonblocking) = self.channel.nonblocking {
            config.nonblocking = nonblocking;
        }
        if let Some(unlimited_queue) = self.channel.unlimited_queue {
            config.unlimited_queue = unlimited_queue;
        }
        if let Some(unlimited_marks) = self.channel.unlimited_marks {
            config.unlimited_marks = unlimited_marks;
        }
        if let Some(millis) = self.channel.poll_interval_ms {
            config.poll_interval = validate_poll_interval(millis)?;
        }
        if let Some(ref decision) = self.channel.permission_decision {
            config.permission_decision = Decision::from_name(decision)
                .ok_or_else(|| ConfigError::UnknownDecision(decision.clone()))?;
        }

        Ok(())
    }
}

impl Overrides {
    /// Apply command-line values on top of `config`
    pub fn apply(&self, config: &mut MonitorConfiguration) -> Result<(), ConfigError> {
        if let Some(ref mount_point) = self.mount_point {
            config.mount_point = mount_point.clone();
        }
        if let Some(ref scope) = self.scope {
            config.scope = parse_scope(scope)?;
        }
        if !self.events.is_empty() {
            config.events = parse_event_names(&self.events)?;
        }
        if self.json {
            config.format = OutputFormat::Json;
        }
        config.quiet |= self.quiet;
        config.exclude.extend(self.exclude.iter().cloned());
        config.skip_pids.extend(self.skip_pids.iter().copied());
        config.include_self |= self.include_self;
        config.show_process |= self.show_process;
        if let Some(millis) = self.poll_interval_ms {
            config.poll_interval = validate_poll_interval(millis)?;
        }
        Ok(())
    }
}

/// Apply the `MOUNT_POINT` environment variable. `lookup` stands in for
/// `std::env::var` so callers decide where the environment comes from.
pub fn apply_env<F>(config: &mut MonitorConfiguration, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mount_point) = lookup(MOUNT_POINT_ENV).filter(|v| !v.is_empty()) {
        config.mount_point = PathBuf::from(mount_point);
    }
}

/// Merge every layer and validate the result
pub fn resolve<F>(
    file: Option<&ConfigFile>,
    env_lookup: F,
    overrides: &Overrides,
) -> Result<MonitorConfiguration>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = MonitorConfiguration::default();
    if let Some(file) = file {
        file.apply(&mut config)?;
    }
    apply_env(&mut config, env_lookup);
    overrides.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load the explicitly named file, or the default one if it exists
pub fn load_config_file(explicit: Option<&Path>) -> Result<Option<ConfigFile>> {
    match explicit {
        Some(path) => ConfigFile::load_from_file(path).map(Some),
        None => match ConfigFile::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("using configuration file {}", path.display());
                ConfigFile::load_from_file(&path).map(Some)
            }
            _ => Ok(None),
        },
    }
}

fn parse_scope(name: &str) -> Result<MarkScope, ConfigError> {
    MarkScope::from_name(name).ok_or_else(|| ConfigError::UnknownScope(name.to_string()))
}

fn parse_format(name: &str) -> Result<OutputFormat, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "human" | "text" => Ok(OutputFormat::Human),
        "json" => Ok(OutputFormat::Json),
        _ => Err(ConfigError::UnknownFormat(name.to_string())),
    }
}
