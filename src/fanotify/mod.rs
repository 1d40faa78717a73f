//! Linux fanotify event channel
//!
//! Handles:
//! - Opening the notification stream (`fanotify_init`)
//! - Registering marks on inodes, mounts and filesystems
//! - Decoding fixed-layout event records and owning their descriptors
//! - Resolving event descriptors to paths
//! - Answering permission events

pub mod channel;
pub mod error;
pub mod event;
pub mod flags;
pub mod record;
mod sys;

pub use channel::{EventChannel, EventStream, InitOptions, Mark};
pub use error::{FanotifyError, Result};
pub use event::Event;
pub use flags::{EventMask, InitFlags, MarkFlags, MarkOp, MarkScope, NotificationClass};
pub use record::{Decision, EventRecord, Response, METADATA_VERSION};
