//! Error types for tuner session management.

use thiserror::Error;

use crate::device::DeviceId;

/// Failures surfaced by the session manager.
///
/// A read that times out with nothing available is not represented here; it
/// is the [`crate::manager::ReadOutcome::NoData`] success case.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerError {
    /// No live session exists for the device identifier.
    #[error("no active session for device {0}")]
    UnknownDevice(DeviceId),

    /// The driver reported a nonzero/negative result.
    ///
    /// The code is the driver's value, never interpreted; a read code
    /// outside the i32 range collapses to [`i32::MIN`].
    #[error("tuner driver failure (code {code})")]
    Driver { code: i32 },
}

impl TunerError {
    /// Returns true for the unknown-device case.
    pub fn is_unknown_device(&self) -> bool {
        matches!(self, TunerError::UnknownDevice(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = TunerError::UnknownDevice(DeviceId::new(9));
        assert_eq!(e.to_string(), "no active session for device 9");

        let e = TunerError::Driver { code: -3 };
        assert_eq!(e.to_string(), "tuner driver failure (code -3)");
    }

    #[test]
    fn test_is_unknown_device() {
        assert!(TunerError::UnknownDevice(DeviceId::new(1)).is_unknown_device());
        assert!(!TunerError::Driver { code: 1 }.is_unknown_device());
    }
}
