//! Typed flag sets for `fanotify_init(2)`, `fanotify_mark(2)` and event masks
//!
//! Values are taken from `<linux/fanotify.h>`.

use bitflags::bitflags;
use nix::fcntl::OFlag;

bitflags! {
    /// Flags passed as the first argument of `fanotify_init`.
    ///
    /// The notification class is not a bit flag and lives in
    /// [`NotificationClass`] instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InitFlags: u32 {
        /// Close the notification descriptor on exec.
        const CLOEXEC = 0x0000_0001;
        /// Reads return `EAGAIN` instead of blocking when the queue is empty.
        const NONBLOCK = 0x0000_0002;
        /// Remove the kernel's 16384 event queue limit.
        const UNLIMITED_QUEUE = 0x0000_0010;
        /// Remove the per-user mark limit.
        const UNLIMITED_MARKS = 0x0000_0020;
        /// Allow permission responses to request an audit record.
        const ENABLE_AUDIT = 0x0000_0040;
        /// Report thread ids instead of process ids.
        const REPORT_TID = 0x0000_0100;
    }
}

impl Default for InitFlags {
    fn default() -> Self {
        Self::CLOEXEC | Self::NONBLOCK | Self::UNLIMITED_QUEUE | Self::UNLIMITED_MARKS
    }
}

/// Notification class selected at init time. The two class bits are used
/// together, so this is an enum rather than part of [`InitFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationClass {
    /// Plain notifications, delivered after the access happened.
    #[default]
    Notify,
    /// Permission events delivered once content is available.
    Content,
    /// Permission events delivered before content is available.
    PreContent,
}

impl NotificationClass {
    pub fn bits(self) -> u32 {
        match self {
            Self::Notify => 0x0000_0000,
            Self::Content => 0x0000_0004,
            Self::PreContent => 0x0000_0008,
        }
    }
}

/// Open flags the kernel applies to the descriptors it hands back in events.
pub fn default_event_open_flags() -> OFlag {
    OFlag::O_RDONLY | OFlag::O_LARGEFILE | OFlag::O_CLOEXEC
}

bitflags! {
    /// Event bits, both for registration and as reported in event records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u64 {
        const ACCESS = 0x0000_0001;
        const MODIFY = 0x0000_0002;
        const ATTRIB = 0x0000_0004;
        const CLOSE_WRITE = 0x0000_0008;
        const CLOSE_NOWRITE = 0x0000_0010;
        const OPEN = 0x0000_0020;
        const MOVED_FROM = 0x0000_0040;
        const MOVED_TO = 0x0000_0080;
        const CREATE = 0x0000_0100;
        const DELETE = 0x0000_0200;
        const DELETE_SELF = 0x0000_0400;
        const MOVE_SELF = 0x0000_0800;
        const OPEN_EXEC = 0x0000_1000;

        /// The kernel dropped events; the record carries no descriptor.
        const Q_OVERFLOW = 0x0000_4000;

        const OPEN_PERM = 0x0001_0000;
        const ACCESS_PERM = 0x0002_0000;
        const OPEN_EXEC_PERM = 0x0004_0000;

        const EVENT_ON_CHILD = 0x0800_0000;
        const ONDIR = 0x4000_0000;

        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();
    }
}

/// Stable names for the single-bit event flags, in bit order.
const EVENT_NAMES: &[(&str, EventMask)] = &[
    ("access", EventMask::ACCESS),
    ("modify", EventMask::MODIFY),
    ("attrib", EventMask::ATTRIB),
    ("close_write", EventMask::CLOSE_WRITE),
    ("close_nowrite", EventMask::CLOSE_NOWRITE),
    ("open", EventMask::OPEN),
    ("moved_from", EventMask::MOVED_FROM),
    ("moved_to", EventMask::MOVED_TO),
    ("create", EventMask::CREATE),
    ("delete", EventMask::DELETE),
    ("delete_self", EventMask::DELETE_SELF),
    ("move_self", EventMask::MOVE_SELF),
    ("open_exec", EventMask::OPEN_EXEC),
    ("q_overflow", EventMask::Q_OVERFLOW),
    ("open_perm", EventMask::OPEN_PERM),
    ("access_perm", EventMask::ACCESS_PERM),
    ("open_exec_perm", EventMask::OPEN_EXEC_PERM),
    ("event_on_child", EventMask::EVENT_ON_CHILD),
    ("ondir", EventMask::ONDIR),
];

impl EventMask {
    /// Bits that block the triggering operation until a response is written.
    pub const PERMISSION: Self = Self::OPEN_PERM
        .union(Self::ACCESS_PERM)
        .union(Self::OPEN_EXEC_PERM);

    /// Looks up a flag by name. Accepts the single-bit names plus the
    /// `close` and `move` composites; case and `-`/`_` are ignored.
    pub fn from_event_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let normalized = normalized.strip_prefix("fan_").unwrap_or(&normalized);
        match normalized {
            "close" => Some(Self::CLOSE),
            "move" => Some(Self::MOVE),
            other => EVENT_NAMES
                .iter()
                .find(|(n, _)| *n == other)
                .map(|(_, flag)| *flag),
        }
    }

    /// Names of every known single-bit flag set in `self`.
    pub fn names(self) -> Vec<&'static str> {
        EVENT_NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Splits the mask into one mask per set bit.
    pub fn split(self) -> Vec<Self> {
        self.iter().collect()
    }

    pub fn is_permission(self) -> bool {
        self.intersects(Self::PERMISSION)
    }
}

bitflags! {
    /// Modifier flags for `fanotify_mark`, on top of the op and scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MarkFlags: u32 {
        const DONT_FOLLOW = 0x0000_0004;
        const ONLYDIR = 0x0000_0008;
        const IGNORED_MASK = 0x0000_0020;
        const IGNORED_SURV_MODIFY = 0x0000_0040;
    }
}

/// What a mark call does to the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOp {
    Add,
    Remove,
    /// Drop every mark of the given scope.
    Flush,
}

impl MarkOp {
    pub fn bits(self) -> u32 {
        match self {
            Self::Add => 0x0000_0001,
            Self::Remove => 0x0000_0002,
            Self::Flush => 0x0000_0080,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Flush => "flush",
        }
    }
}

/// Object a mark is attached to. Exactly one scope applies per mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkScope {
    /// The single file or directory at the path.
    Inode,
    /// Every object on the mount containing the path.
    #[default]
    Mount,
    /// Every object on the filesystem containing the path.
    Filesystem,
}

impl MarkScope {
    pub fn bits(self) -> u32 {
        match self {
            Self::Inode => 0x0000_0000,
            Self::Mount => 0x0000_0010,
            Self::Filesystem => 0x0000_0100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inode => "inode",
            Self::Mount => "mount",
            Self::Filesystem => "filesystem",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "inode" | "file" => Some(Self::Inode),
            "mount" => Some(Self::Mount),
            "filesystem" | "fs" => Some(Self::Filesystem),
            _ => None,
        }
    }
}
