#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};
use std::os::fd::IntoRawFd;
use std::time::Duration;

use fanmon::fanotify::{EventMask, EventRecord, EventStream};
use tempfile::NamedTempFile;

/// In-memory notification stream.
///
/// Each queued chunk is returned by a separate `read` call, mirroring how the
/// kernel hands out whole batches of records. An empty queue reports
/// `WouldBlock` like a non-blocking descriptor.
#[derive(Default)]
pub struct MockStream {
    chunks: VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one kernel read worth of records
    pub fn push_batch(&mut self, records: &[EventRecord]) {
        self.chunks
            .push_back(records.iter().flat_map(|r| r.encode()).collect());
    }

    pub fn push_bytes(&mut self, bytes: Vec<u8>) {
        self.chunks.push_back(bytes);
    }

    /// Response records written so far as `(fd, code)` pairs
    pub fn responses(&self) -> Vec<(i32, u32)> {
        self.written
            .chunks_exact(8)
            .map(|r| {
                (
                    i32::from_le_bytes(r[0..4].try_into().unwrap()),
                    u32::from_le_bytes(r[4..8].try_into().unwrap()),
                )
            })
            .collect()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.chunks.front_mut() else {
            return Err(io::ErrorKind::WouldBlock.into());
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.chunks.pop_front();
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl EventStream for MockStream {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        if self.chunks.is_empty() {
            std::thread::sleep(timeout);
            Ok(false)
        } else {
            Ok(true)
        }
    }
}

/// A real file plus a descriptor for it that the record will own, the way
/// the kernel installs one descriptor per event
pub struct TrackedFile {
    pub file: NamedTempFile,
    pub fd: i32,
}

impl TrackedFile {
    pub fn new() -> Self {
        let file = NamedTempFile::new().expect("create temp file");
        let fd = file.reopen().expect("reopen temp file").into_raw_fd();
        Self { file, fd }
    }

    pub fn record(&self, mask: EventMask, pid: i32) -> EventRecord {
        EventRecord::new(mask.bits(), self.fd, pid)
    }

    /// Path as the kernel reports it through /proc
    pub fn canonical_path(&self) -> String {
        self.file
            .path()
            .canonicalize()
            .expect("canonicalize temp file")
            .display()
            .to_string()
    }
}

/// Number of descriptors currently open in this process
pub fn open_fd_count() -> usize {
    fs::read_dir("/proc/self/fd")
        .expect("read /proc/self/fd")
        .count()
}

pub fn own_pid() -> i32 {
    std::process::id() as i32
}
