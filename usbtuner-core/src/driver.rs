//! The tuner driver contract.

use std::time::Duration;

use crate::device::DeviceId;

/// Demultiplexer filter kinds callers can request.
///
/// Discriminants are stable so drivers that speak raw integers can take
/// the value from [`FilterKind::as_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FilterKind {
    /// PSI/SI section data (PAT, PMT, ATSC tables).
    Section = 0,
    /// PES audio elementary stream.
    Audio = 1,
    /// PES video elementary stream.
    Video = 2,
    /// Program clock reference.
    Pcr = 3,
    /// Any other PES payload.
    Other = 4,
}

impl FilterKind {
    /// The integer value handed to drivers.
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// One physical or logical tuner device.
///
/// The layers above rely only on the documented return codes, nothing
/// richer; an implementation typically wraps a kernel character device or a
/// vendor SDK that already speaks these conventions. Device resources are
/// released when the instance is dropped.
pub trait TunerDriver: Send {
    /// Tune the frontend to `frequency` with the given modulation.
    ///
    /// `modulation` is passed through verbatim (e.g. "8VSB", "QAM256"); its
    /// interpretation belongs to the driver. Returns 0 once the frontend
    /// locks within `timeout`, any other value on failure.
    fn tune(&mut self, frequency: u32, modulation: &str, timeout: Duration) -> i32;

    /// Tear down the current tune. Idempotent.
    fn stop_tune(&mut self);

    /// Register a demultiplex filter for `pid`.
    ///
    /// Behavior on a duplicate pid is driver-defined.
    fn add_pid_filter(&mut self, pid: u16, kind: FilterKind);

    /// Remove every active filter on this instance.
    fn close_all_pid_filters(&mut self);

    /// Read demultiplexed TS bytes into `buf`, blocking up to `timeout`.
    ///
    /// `buf.len()` must be a whole multiple of 188 and at most
    /// [`crate::ts::MAX_CHUNK_SIZE`]. Returns the byte count on success, 0
    /// when nothing arrived within the timeout, and a negative code on
    /// device error.
    fn read_stream(&mut self, buf: &mut [u8], timeout: Duration) -> isize;
}

/// Factory producing a fresh driver for a device identifier.
///
/// Invoked by the manager the first time a device is tuned.
pub type DriverFactory = Box<dyn Fn(DeviceId) -> Box<dyn TunerDriver> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_kind_raw_values() {
        assert_eq!(FilterKind::Section.as_raw(), 0);
        assert_eq!(FilterKind::Audio.as_raw(), 1);
        assert_eq!(FilterKind::Video.as_raw(), 2);
        assert_eq!(FilterKind::Pcr.as_raw(), 3);
        assert_eq!(FilterKind::Other.as_raw(), 4);
    }
}
