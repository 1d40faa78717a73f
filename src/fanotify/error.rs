//! Error types for the event channel.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for channel operations.
pub type Result<T> = std::result::Result<T, FanotifyError>;

/// Errors raised by the event channel. Every variant names the operation that
/// failed.
#[derive(Error, Debug)]
pub enum FanotifyError {
    /// The notification facility could not be created.
    #[error("fanotify_init failed: {0}")]
    Init(#[source] io::Error),

    /// A mark was rejected before reaching the kernel.
    #[error("invalid {op} mark on {path}: {reason}")]
    InvalidMark {
        op: &'static str,
        path: PathBuf,
        reason: &'static str,
    },

    /// The kernel rejected a mark.
    #[error("fanotify_mark {op} ({scope}) on {path} failed: {source}")]
    Mark {
        op: &'static str,
        scope: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading an event record failed or returned a truncated record.
    #[error("failed to read event record: {0}")]
    Read(#[source] io::Error),

    /// The record's metadata version does not match the supported one.
    #[error("event metadata version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u8, found: u8 },

    /// The event carries no descriptor (for example a queue overflow).
    #[error("event has no file descriptor (mask {mask:#x})")]
    NoDescriptor { mask: u64 },

    /// The descriptor could not be resolved to a path.
    #[error("failed to resolve path of fd {fd}: {source}")]
    Path {
        fd: i32,
        #[source]
        source: io::Error,
    },

    /// Releasing an event descriptor failed.
    #[error("failed to close fd {fd}: {source}")]
    Close {
        fd: i32,
        #[source]
        source: nix::Error,
    },

    /// Writing a permission response failed.
    #[error("failed to write response for fd {fd}: {source}")]
    Write {
        fd: i32,
        #[source]
        source: io::Error,
    },

    /// Waiting for the stream to become readable failed.
    #[error("failed to wait for events: {0}")]
    Wait(#[source] io::Error),
}

impl FanotifyError {
    /// Whether this error belongs to the startup phase (init and marks).
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Init(_) | Self::InvalidMark { .. } | Self::Mark { .. }
        )
    }
}
