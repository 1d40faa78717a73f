//! Wire format of `struct fanotify_event_metadata` and `struct fanotify_response`

use std::io::{self, Read};

/// `FANOTIFY_METADATA_VERSION`; records with any other version are rejected.
pub const METADATA_VERSION: u8 = 3;

/// Size in bytes of one event metadata record.
pub const EVENT_METADATA_LEN: usize = 24;

/// Size in bytes of one response record.
pub const RESPONSE_LEN: usize = 8;

/// `FAN_NOFD`: the record carries no descriptor.
pub const NO_FD: i32 = -1;

/// One event metadata record exactly as the kernel lays it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub event_len: u32,
    pub version: u8,
    pub reserved: u8,
    pub metadata_len: u16,
    pub mask: u64,
    pub fd: i32,
    pub pid: i32,
}

impl EventRecord {
    /// A well-formed record for the current protocol version.
    pub fn new(mask: u64, fd: i32, pid: i32) -> Self {
        Self {
            event_len: EVENT_METADATA_LEN as u32,
            version: METADATA_VERSION,
            reserved: 0,
            metadata_len: EVENT_METADATA_LEN as u16,
            mask,
            fd,
            pid,
        }
    }

    pub fn decode(buf: &[u8; EVENT_METADATA_LEN]) -> Self {
        Self {
            event_len: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            version: buf[4],
            reserved: buf[5],
            metadata_len: u16::from_le_bytes([buf[6], buf[7]]),
            mask: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
            fd: i32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            pid: i32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
        }
    }

    pub fn encode(&self) -> [u8; EVENT_METADATA_LEN] {
        let mut buf = [0u8; EVENT_METADATA_LEN];
        buf[0..4].copy_from_slice(&self.event_len.to_le_bytes());
        buf[4] = self.version;
        buf[5] = self.reserved;
        buf[6..8].copy_from_slice(&self.metadata_len.to_le_bytes());
        buf[8..16].copy_from_slice(&self.mask.to_le_bytes());
        buf[16..20].copy_from_slice(&self.fd.to_le_bytes());
        buf[20..24].copy_from_slice(&self.pid.to_le_bytes());
        buf
    }

    /// Reads exactly one record. The embedded length is not used to skip
    /// trailing info records; the stream is a sequence of fixed-size records.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; EVENT_METADATA_LEN];
        reader.read_exact(&mut buf)?;
        Ok(Self::decode(&buf))
    }

    pub fn has_valid_version(&self) -> bool {
        self.version == METADATA_VERSION
    }

    pub fn has_fd(&self) -> bool {
        self.fd >= 0
    }
}

/// Verdict for a permission event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn code(self) -> u32 {
        match self {
            Self::Allow => 0x01,
            Self::Deny => 0x02,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

/// `FAN_AUDIT`, OR'd into the response code.
pub const AUDIT_BIT: u32 = 0x10;

/// Response written back to the notification stream for a permission event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub fd: i32,
    pub decision: Decision,
    pub audit: bool,
}

impl Response {
    pub fn code(&self) -> u32 {
        let mut code = self.decision.code();
        if self.audit {
            code |= AUDIT_BIT;
        }
        code
    }

    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut buf = [0u8; RESPONSE_LEN];
        buf[0..4].copy_from_slice(&self.fd.to_le_bytes());
        buf[4..8].copy_from_slice(&self.code().to_le_bytes());
        buf
    }
}
