//! Per-device tuner session lifecycle.

use std::time::Duration;

use log::{debug, info, warn};

use crate::device::DeviceId;
use crate::driver::{FilterKind, TunerDriver};
use crate::error::TunerError;

/// Observable state of a live session.
///
/// "Untuned" has no variant here: it is the absence of a session in the
/// registry. A session comes into existence on the first tune attempt and
/// starts out `Stopped` until the driver reports a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No active tune (initial, after a failed tune, or after `stop`).
    Stopped,
    /// Frontend locked, no filters registered.
    Tuned,
    /// Frontend locked with one or more PID filters active.
    Filtering,
}

/// One active binding between a device identifier and a driver instance.
///
/// The session sequences tune, filter management, streaming and stop against
/// its driver. It is exclusively owned by its registry entry; the driver is
/// released when the session is dropped.
pub struct TunerSession {
    device_id: DeviceId,
    driver: Box<dyn TunerDriver>,
    tuned: bool,
    /// Adds since the last close-all/stop. Advisory, for state reporting
    /// only; filter identities live in the driver.
    filter_count: u32,
}

impl TunerSession {
    /// Wrap a fresh driver instance for `device_id`.
    pub fn new(device_id: DeviceId, driver: Box<dyn TunerDriver>) -> Self {
        Self {
            device_id,
            driver,
            tuned: false,
            filter_count: 0,
        }
    }

    /// The owning device identifier.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        match (self.tuned, self.filter_count) {
            (false, _) => SessionState::Stopped,
            (true, 0) => SessionState::Tuned,
            (true, _) => SessionState::Filtering,
        }
    }

    /// Number of filter adds since the last close-all/stop.
    pub fn active_filter_count(&self) -> u32 {
        self.filter_count
    }

    /// Tune the frontend, blocking up to `timeout` for a lock.
    ///
    /// `modulation` goes to the driver verbatim. Re-tuning an already tuned
    /// session is permitted and reuses the same driver instance. On failure
    /// the session is left stopped; it stays registered until finalized.
    pub fn tune(
        &mut self,
        frequency: u32,
        modulation: &str,
        timeout: Duration,
    ) -> Result<(), TunerError> {
        let code = self.driver.tune(frequency, modulation, timeout);
        if code == 0 {
            self.tuned = true;
            info!(
                "Tuned device {} to {} Hz ({})",
                self.device_id, frequency, modulation
            );
            Ok(())
        } else {
            self.tuned = false;
            self.filter_count = 0;
            warn!(
                "Tune failed for device {} at {} Hz ({}): driver code {}",
                self.device_id, frequency, modulation, code
            );
            Err(TunerError::Driver { code })
        }
    }

    /// Register a demultiplex filter for `pid`.
    ///
    /// Forwarded to the driver regardless of state; duplicate-pid behavior
    /// is driver-defined.
    pub fn add_pid_filter(&mut self, pid: u16, kind: FilterKind) {
        debug!(
            "Adding PID filter 0x{:04x} ({:?}) on device {}",
            pid, kind, self.device_id
        );
        self.driver.add_pid_filter(pid, kind);
        self.filter_count += 1;
    }

    /// Remove every active filter; the tune stays up.
    pub fn close_all_pid_filters(&mut self) {
        debug!(
            "Closing all PID filters on device {} ({} active)",
            self.device_id, self.filter_count
        );
        self.driver.close_all_pid_filters();
        self.filter_count = 0;
    }

    /// Tear down the current tune.
    ///
    /// The session stays registered; only finalize removes it.
    pub fn stop(&mut self) {
        info!("Stopping tune on device {}", self.device_id);
        self.driver.stop_tune();
        self.tuned = false;
        self.filter_count = 0;
    }

    /// Read demultiplexed TS bytes, passing the driver's raw result through.
    ///
    /// Outcome classification belongs to the streaming adapter.
    pub fn read_stream(&mut self, buf: &mut [u8], timeout: Duration) -> isize {
        self.driver.read_stream(buf, timeout)
    }
}
