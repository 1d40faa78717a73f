//! The event channel: one notification stream plus its buffered reader.

use std::ffi::CString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, trace, warn};
use nix::fcntl::OFlag;

use crate::fanotify::error::{FanotifyError, Result};
use crate::fanotify::event::Event;
use crate::fanotify::flags::{
    default_event_open_flags, EventMask, InitFlags, MarkFlags, MarkOp, MarkScope,
    NotificationClass,
};
use crate::fanotify::record::{Decision, EventRecord, Response, METADATA_VERSION};
use crate::fanotify::sys;

/// Enough room for a few hundred records per kernel read.
const READ_BUFFER_SIZE: usize = 8192;

/// Arguments for `fanotify_init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    pub flags: InitFlags,
    pub class: NotificationClass,
    /// Template applied to descriptors the kernel opens for events.
    pub event_flags: OFlag,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            flags: InitFlags::default(),
            class: NotificationClass::default(),
            event_flags: default_event_open_flags(),
        }
    }
}

/// A watch registration handed to `fanotify_mark`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub op: MarkOp,
    pub scope: MarkScope,
    pub mask: EventMask,
    pub flags: MarkFlags,
    pub path: PathBuf,
}

impl Mark {
    /// Adds `mask` on the given scope of `path`.
    pub fn add(scope: MarkScope, mask: EventMask, path: impl Into<PathBuf>) -> Self {
        Self {
            op: MarkOp::Add,
            scope,
            mask,
            flags: MarkFlags::empty(),
            path: path.into(),
        }
    }

    pub fn remove(scope: MarkScope, mask: EventMask, path: impl Into<PathBuf>) -> Self {
        Self {
            op: MarkOp::Remove,
            ..Self::add(scope, mask, path)
        }
    }

    /// Drops every mark of `scope`; the path is ignored by the kernel.
    pub fn flush(scope: MarkScope) -> Self {
        Self {
            op: MarkOp::Flush,
            ..Self::add(scope, EventMask::empty(), PathBuf::new())
        }
    }

    pub fn with_flags(mut self, flags: MarkFlags) -> Self {
        self.flags = flags;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason| FanotifyError::InvalidMark {
            op: self.op.as_str(),
            path: self.path.clone(),
            reason,
        };

        if self.op == MarkOp::Flush {
            return Ok(());
        }
        if self.mask.is_empty() {
            return Err(invalid("event mask must not be empty"));
        }
        if self.path.as_os_str().is_empty() {
            return Err(invalid("path must not be empty"));
        }
        Ok(())
    }

    fn kernel_flags(&self) -> u32 {
        self.op.bits() | self.scope.bits() | self.flags.bits()
    }
}

/// Streams that can tell whether a read would make progress.
pub trait EventStream: Read + Write {
    /// Returns `true` if the stream became readable within `timeout`.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;
}

impl EventStream for File {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        sys::poll_readable(self.as_fd(), timeout)
    }
}

/// Owner of one notification stream.
///
/// Reads go through an internal buffer, so a single kernel read can deliver
/// many records. Pulling needs `&mut self`, which keeps readers serialized.
pub struct EventChannel<S = File> {
    reader: BufReader<S>,
    /// Verdict for permission events that never reach the caller (skipped
    /// pids, drained records).
    unattended: Decision,
}

impl EventChannel<File> {
    /// Opens the kernel notification facility.
    pub fn init(options: &InitOptions) -> Result<Self> {
        let flags = options.flags.bits() | options.class.bits();
        let event_flags = options.event_flags.bits() as u32;

        let fd = sys::fanotify_init(flags, event_flags).map_err(FanotifyError::Init)?;
        debug!("fanotify initialized (flags {flags:#x}, event flags {event_flags:#x})");

        Ok(Self::from_stream(File::from(fd)))
    }
}

impl<S: Read> EventChannel<S> {
    /// Wraps an already open stream of event records.
    pub fn from_stream(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            unattended: Decision::Allow,
        }
    }
}

impl<S> EventChannel<S> {
    /// Sets the verdict written for permission events the channel consumes
    /// itself. Defaults to [`Decision::Allow`].
    pub fn with_unattended_decision(mut self, decision: Decision) -> Self {
        self.unattended = decision;
        self
    }

    pub fn unattended_decision(&self) -> Decision {
        self.unattended
    }

    /// Whether decoded-but-unconsumed bytes are sitting in the buffer.
    pub fn has_buffered(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: AsFd> EventChannel<S> {
    /// Registers, removes or flushes a mark with paths relative to the
    /// working directory.
    pub fn mark(&self, mark: &Mark) -> Result<()> {
        self.mark_at(None, mark)
    }

    /// Like [`EventChannel::mark`], resolving relative paths against `dirfd`.
    pub fn mark_at(&self, dirfd: Option<BorrowedFd<'_>>, mark: &Mark) -> Result<()> {
        mark.validate()?;

        let kernel_error = |source| FanotifyError::Mark {
            op: mark.op.as_str(),
            scope: mark.scope.as_str(),
            path: mark.path.clone(),
            source,
        };

        let path = if mark.op == MarkOp::Flush {
            None
        } else {
            Some(CString::new(mark.path.as_os_str().as_bytes()).map_err(|_| {
                kernel_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path contains a NUL byte",
                ))
            })?)
        };

        sys::fanotify_mark(
            self.reader.get_ref().as_fd(),
            mark.kernel_flags(),
            mark.mask.bits(),
            dirfd,
            path.as_ref(),
        )
        .map_err(kernel_error)?;

        debug!(
            "fanotify mark {} ({}) {:?} on {}",
            mark.op.as_str(),
            mark.scope.as_str(),
            mark.mask.names(),
            display_path(&mark.path)
        );
        Ok(())
    }
}

impl<S: EventStream> EventChannel<S> {
    /// Waits up to `timeout` for a record to become available.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        if self.has_buffered() {
            return Ok(true);
        }
        self.reader
            .get_ref()
            .wait_readable(timeout)
            .map_err(FanotifyError::Wait)
    }
}

impl<S: Read + Write> EventChannel<S> {
    /// Reads and decodes one record.
    ///
    /// Returns `Ok(None)` when the record came from one of `skip_pids` or when
    /// a non-blocking stream has nothing queued. A skipped permission event is
    /// answered with the unattended decision before its descriptor is closed,
    /// so the skipped process is never left blocked. A record with the wrong
    /// metadata version is consumed, its descriptor closed, and reported as
    /// [`FanotifyError::VersionMismatch`].
    pub fn pull(&mut self, skip_pids: &[i32]) -> Result<Option<Event>> {
        let record = match EventRecord::read_from(&mut self.reader) {
            Ok(record) => record,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(err) => return Err(FanotifyError::Read(err)),
        };
        trace!("decoded {record:?}");

        let event = Event::from_record(&record);

        if !record.has_valid_version() {
            if let Err(err) = event.close() {
                warn!("{err}");
            }
            return Err(FanotifyError::VersionMismatch {
                expected: METADATA_VERSION,
                found: record.version,
            });
        }

        if skip_pids.contains(&record.pid) {
            trace!("skipping event from pid {}", record.pid);
            self.release(event)?;
            return Ok(None);
        }

        Ok(Some(event))
    }

    /// Answers a permission event with the unattended decision, then closes
    /// it. The descriptor is closed even if the response fails.
    fn release(&mut self, event: Event) -> Result<()> {
        let answered = if event.mask().is_permission() {
            self.respond(&event, self.unattended, false)
        } else {
            Ok(())
        };
        let closed = event.close();
        answered.and(closed)
    }

    /// Reads until no full record is buffered; used to drain a stream after a
    /// shutdown request so every pending descriptor is released.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.has_buffered() {
            match self.reader.fill_buf() {
                Ok(buf) if buf.len() >= crate::fanotify::record::EVENT_METADATA_LEN => {}
                _ => break,
            }
            match self.pull(&[]) {
                Ok(Some(event)) => {
                    if let Err(err) = self.release(event) {
                        warn!("while draining: {err}");
                    }
                    drained += 1;
                }
                Ok(None) => break,
                Err(err) => warn!("while draining: {err}"),
            }
        }
        drained
    }
}

impl<S: Write> EventChannel<S> {
    /// Writes one response record for a permission event.
    pub fn respond(&mut self, event: &Event, decision: Decision, audit: bool) -> Result<()> {
        let fd = event.raw_fd().ok_or(FanotifyError::NoDescriptor {
            mask: event.mask().bits(),
        })?;
        let response = Response { fd, decision, audit };

        let stream = self.reader.get_mut();
        let written = stream.write_all(&response.encode());
        written
            .and_then(|()| stream.flush())
            .map_err(|source| FanotifyError::Write { fd, source })
    }

    pub fn allow(&mut self, event: &Event) -> Result<()> {
        self.respond(event, Decision::Allow, false)
    }

    pub fn deny(&mut self, event: &Event) -> Result<()> {
        self.respond(event, Decision::Deny, false)
    }
}

fn display_path(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        "<none>".to_string()
    } else {
        path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_mark_validation() {
        let empty = Mark::add(MarkScope::Mount, EventMask::empty(), "/");
        assert!(matches!(
            empty.validate(),
            Err(FanotifyError::InvalidMark { .. })
        ));

        let no_path = Mark::add(MarkScope::Inode, EventMask::MODIFY, "");
        assert!(no_path.validate().is_err());

        assert!(Mark::flush(MarkScope::Mount).validate().is_ok());
        assert!(Mark::add(MarkScope::Mount, EventMask::MODIFY, "/").validate().is_ok());
    }

    #[test]
    fn test_mark_kernel_flags() {
        let mark = Mark::add(MarkScope::Mount, EventMask::MODIFY, "/")
            .with_flags(MarkFlags::DONT_FOLLOW);
        assert_eq!(mark.kernel_flags(), 0x01 | 0x10 | 0x04);

        let mark = Mark::remove(MarkScope::Filesystem, EventMask::MODIFY, "/");
        assert_eq!(mark.kernel_flags(), 0x02 | 0x100);

        assert_eq!(Mark::flush(MarkScope::Inode).kernel_flags(), 0x80);
    }

    #[test]
    fn test_pull_without_descriptor() {
        let bytes = EventRecord::new(EventMask::Q_OVERFLOW.bits(), -1, 1).encode();
        let mut channel = EventChannel::from_stream(Cursor::new(bytes.to_vec()));

        let event = channel.pull(&[]).unwrap().unwrap();
        assert!(event.is_overflow());
        assert!(!channel.has_buffered());
        assert!(matches!(channel.pull(&[]), Err(FanotifyError::Read(_))));
    }

    #[test]
    fn test_respond_requires_descriptor() {
        let bytes = EventRecord::new(EventMask::OPEN_PERM.bits(), -1, 1).encode();
        let mut channel = EventChannel::from_stream(Cursor::new(bytes.to_vec()));
        let event = channel.pull(&[]).unwrap().unwrap();

        assert!(matches!(
            channel.allow(&event),
            Err(FanotifyError::NoDescriptor { .. })
        ));
    }
}
