//! Raw syscall shims
//!
//! Every `unsafe` block of the crate lives here. Callers get owned
//! descriptors and `io::Result`s back.

#![allow(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// `fanotify_init(2)`; the returned descriptor is the notification stream.
pub fn fanotify_init(flags: u32, event_f_flags: u32) -> io::Result<OwnedFd> {
    let fd = unsafe { libc::fanotify_init(flags, event_f_flags) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// `fanotify_mark(2)`. A `None` dirfd means `AT_FDCWD`.
pub fn fanotify_mark(
    fanotify: BorrowedFd<'_>,
    flags: u32,
    mask: u64,
    dirfd: Option<BorrowedFd<'_>>,
    path: Option<&CString>,
) -> io::Result<()> {
    let dirfd = dirfd.map_or(libc::AT_FDCWD, |fd| fd.as_raw_fd());
    let path = path.map_or(std::ptr::null(), |p| p.as_ptr());

    let rc = unsafe { libc::fanotify_mark(fanotify.as_raw_fd(), flags, mask, dirfd, path) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Waits until `fd` is readable or `timeout` expires. `EINTR` counts as a
/// timeout so signal handlers get a chance to run.
pub fn poll_readable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0 && pfd.revents & libc::POLLIN != 0)
}

/// Takes ownership of a descriptor number the kernel placed in an event record.
///
/// The kernel installs a fresh descriptor in our table for every event that
/// carries one, so adopting it is the only way to make sure it gets closed.
/// Callers must pass a non-negative number taken straight from a record.
pub fn adopt_event_fd(fd: RawFd) -> OwnedFd {
    debug_assert!(fd >= 0);
    unsafe { OwnedFd::from_raw_fd(fd) }
}
