//! Opaque device identifiers for tuner hardware.

use std::fmt;

/// An opaque 64-bit handle identifying one attached tuner device.
///
/// The caller assigns the value (typically derived from the device path or
/// USB topology) and it stays stable for the lifetime of one attachment.
/// The core never interprets it; it is only the key into the session
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// Create an identifier from its raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for DeviceId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
