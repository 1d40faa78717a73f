//! File access monitoring
//!
//! Handles:
//! - Opening the event channel and placing the configured mark
//! - The polling loop that turns events into output lines
//! - Optional process name enrichment

pub mod polling;
pub mod process_names;

pub use polling::{Monitor, MonitorContext, StepOutcome};
pub use process_names::ProcessNames;

use anyhow::{Context, Result};
use log::info;

use crate::fanotify::{EventChannel, Mark};
use crate::models::MonitorConfiguration;

/// Initializes the channel and marks the configured path. Any failure here
/// is fatal: nothing useful can be reported without a mark.
pub fn open_channel(config: &MonitorConfiguration) -> Result<EventChannel> {
    let channel = EventChannel::init(&config.init_options())
        .context("Failed to open the fanotify channel (CAP_SYS_ADMIN is required)")?;

    let mark = Mark::add(config.scope, config.events, &config.mount_point);
    channel.mark(&mark).with_context(|| {
        format!(
            "Failed to watch {} ({})",
            config.mount_point.display(),
            config.scope.as_str()
        )
    })?;

    info!(
        "watching {} ({}) for {:?}",
        config.mount_point.display(),
        config.scope.as_str(),
        config.events.names()
    );
    Ok(channel)
}
