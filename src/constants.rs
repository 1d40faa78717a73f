//! Global constants for fanmon
//!
//! Centralized location for application-wide constants

/// Environment variable selecting the mount point to watch
pub const MOUNT_POINT_ENV: &str = "MOUNT_POINT";

/// Mount point watched when neither CLI, environment nor config file name one
pub const DEFAULT_MOUNT_POINT: &str = "/";

/// Config file looked up under the user's config directory
pub const CONFIG_DIR_NAME: &str = "fanmon";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Poll interval bounds in milliseconds
pub const POLL_INTERVAL_MIN_MS: u64 = 10;
pub const POLL_INTERVAL_MAX_MS: u64 = 60_000;
