//! Decoded fanotify events.

use std::fs::{self, Metadata};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use crate::fanotify::error::{FanotifyError, Result};
use crate::fanotify::flags::EventMask;
use crate::fanotify::record::EventRecord;
use crate::fanotify::sys;

/// Directory of per-process descriptor links.
const PROC_SELF_FD: &str = "/proc/self/fd";

/// One event pulled from the notification stream.
///
/// The event owns the descriptor the kernel installed for it. Dropping the
/// event closes it; [`Event::close`] does the same but reports failures.
#[derive(Debug)]
pub struct Event {
    mask: EventMask,
    pid: i32,
    fd: Option<OwnedFd>,
}

impl Event {
    /// Takes ownership of the record's descriptor, if it carries one.
    pub(crate) fn from_record(record: &EventRecord) -> Self {
        Self {
            mask: EventMask::from_bits_retain(record.mask),
            pid: record.pid,
            fd: record.has_fd().then(|| sys::adopt_event_fd(record.fd)),
        }
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// Id of the process (or thread, with `REPORT_TID`) that caused the event.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        self.fd.as_ref().map(|fd| fd.as_fd())
    }

    /// True iff `mask` is non-empty and all of its bits are set on the event.
    pub fn matches(&self, mask: EventMask) -> bool {
        !mask.is_empty() && self.mask.contains(mask)
    }

    pub fn is_overflow(&self) -> bool {
        self.mask.contains(EventMask::Q_OVERFLOW)
    }

    fn link(&self) -> Result<(RawFd, PathBuf)> {
        let fd = self.raw_fd().ok_or(FanotifyError::NoDescriptor {
            mask: self.mask.bits(),
        })?;
        Ok((fd, PathBuf::from(PROC_SELF_FD).join(fd.to_string())))
    }

    /// Resolves the descriptor to the path of the affected file.
    ///
    /// The file may have been renamed or unlinked since the event was queued;
    /// the kernel then reports the new name or a ` (deleted)` suffix.
    pub fn resolve_path(&self) -> Result<PathBuf> {
        let (fd, link) = self.link()?;
        fs::read_link(&link).map_err(|source| FanotifyError::Path { fd, source })
    }

    /// Stats the affected file through its descriptor.
    pub fn metadata(&self) -> Result<Metadata> {
        let (fd, link) = self.link()?;
        fs::metadata(&link).map_err(|source| FanotifyError::Path { fd, source })
    }

    /// Releases the descriptor. Consuming `self` makes a second close
    /// impossible.
    pub fn close(mut self) -> Result<()> {
        match self.fd.take() {
            Some(fd) => {
                let raw = fd.into_raw_fd();
                nix::unistd::close(raw).map_err(|source| FanotifyError::Close { fd: raw, source })
            }
            None => Ok(()),
        }
    }
}
