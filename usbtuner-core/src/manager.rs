//! Session management and the chunked streaming adapter.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::device::DeviceId;
use crate::driver::{DriverFactory, FilterKind, TunerDriver};
use crate::error::TunerError;
use crate::metrics::TunerMetrics;
use crate::registry::SessionRegistry;
use crate::session::{SessionState, TunerSession};
use crate::ts;

/// Result of one chunked read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes copied into the destination: a whole number of TS packets,
    /// at most [`ts::MAX_CHUNK_SIZE`], never zero.
    Data(usize),
    /// Nothing arrived within the timeout. A normal outcome, not an error.
    NoData,
}

/// Manages every tuner session in the process and services chunked reads.
///
/// Sessions are created lazily on the first tune for a device identifier
/// and live until explicitly finalized. Operations on the same identifier
/// are ordered by call sequence; the manager adds no threading of its own,
/// and only the stream read blocks (bounded by its timeout, inside the
/// driver).
pub struct TunerManager {
    registry: SessionRegistry,
    factory: DriverFactory,
    metrics: Arc<TunerMetrics>,
}

impl TunerManager {
    /// Create a manager whose sessions draw drivers from `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(DeviceId) -> Box<dyn TunerDriver> + Send + Sync + 'static,
    {
        Self {
            registry: SessionRegistry::new(),
            factory: Box::new(factory),
            metrics: TunerMetrics::new(),
        }
    }

    /// Shared handle to the transfer metrics sink.
    pub fn metrics(&self) -> Arc<TunerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.count()
    }

    /// Observable state of the session for `device_id`, if one exists.
    pub fn session_state(&self, device_id: DeviceId) -> Option<SessionState> {
        self.registry
            .lookup(device_id)
            .map(|session| session.lock().state())
    }

    /// Tune `device_id`, creating its session on first use.
    ///
    /// The session exists afterwards even if the tune failed; it stays
    /// registered (stopped) until [`TunerManager::finalize`] removes it.
    pub fn tune(
        &self,
        device_id: DeviceId,
        frequency: u32,
        modulation: &str,
        timeout: Duration,
    ) -> Result<(), TunerError> {
        let session = self.registry.resolve_or_create(device_id, || {
            self.metrics.record_session_created();
            TunerSession::new(device_id, (self.factory)(device_id))
        });
        let mut session = session.lock();
        session.tune(frequency, modulation, timeout)
    }

    /// Register a PID filter on the session for `device_id`.
    ///
    /// Silently ignored when no session exists.
    pub fn add_pid_filter(&self, device_id: DeviceId, pid: u16, kind: FilterKind) {
        match self.registry.lookup(device_id) {
            Some(session) => session.lock().add_pid_filter(pid, kind),
            None => debug!("Ignoring PID filter add for unknown device {}", device_id),
        }
    }

    /// Remove every PID filter on the session for `device_id`.
    ///
    /// Silently ignored when no session exists.
    pub fn close_all_pid_filters(&self, device_id: DeviceId) {
        match self.registry.lookup(device_id) {
            Some(session) => session.lock().close_all_pid_filters(),
            None => debug!("Ignoring filter close for unknown device {}", device_id),
        }
    }

    /// Tear down the tune for `device_id`, keeping the session registered.
    ///
    /// Silently ignored when no session exists.
    pub fn stop(&self, device_id: DeviceId) {
        match self.registry.lookup(device_id) {
            Some(session) => session.lock().stop(),
            None => debug!("Ignoring stop for unknown device {}", device_id),
        }
    }

    /// Remove the session for `device_id` and release its driver.
    ///
    /// Idempotent; the only path that frees driver resources.
    pub fn finalize(&self, device_id: DeviceId) {
        if self.registry.remove_and_dispose(device_id) {
            self.metrics.record_session_finalized();
        }
    }

    /// Read one chunk of demultiplexed TS data into `dest`.
    ///
    /// The usable size is `dest.len()` floored to a whole number of TS
    /// packets and capped at [`ts::MAX_CHUNK_SIZE`]; a destination smaller
    /// than one packet results in a zero-length driver read, passed through
    /// unchanged. The read blocks up to `timeout` inside the driver. On
    /// [`ReadOutcome::Data`] exactly that many bytes are written to the
    /// front of `dest`; no other outcome writes anything.
    pub fn read_chunk(
        &self,
        device_id: DeviceId,
        dest: &mut [u8],
        timeout: Duration,
    ) -> Result<ReadOutcome, TunerError> {
        let session = self
            .registry
            .lookup(device_id)
            .ok_or(TunerError::UnknownDevice(device_id))?;

        let effective = ts::effective_read_size(dest.len());
        let mut chunk = [0u8; ts::MAX_CHUNK_SIZE];

        // Session lock held across the bounded read; the registry lock is not.
        let result = session.lock().read_stream(&mut chunk[..effective], timeout);

        match result {
            n if n > 0 => {
                let mut n = n as usize;
                if n > effective {
                    warn!(
                        "Driver claimed {} bytes for a {}-byte read on device {}; clamping",
                        n, effective, device_id
                    );
                    n = effective;
                }
                if n == 0 {
                    // A claim clamped to a zero-size read delivered nothing.
                    self.metrics.record_empty_read();
                    return Ok(ReadOutcome::NoData);
                }
                dest[..n].copy_from_slice(&chunk[..n]);
                self.metrics.record_chunk(n as u64);
                Ok(ReadOutcome::Data(n))
            }
            0 => {
                debug!("No data from device {} within timeout", device_id);
                self.metrics.record_empty_read();
                Ok(ReadOutcome::NoData)
            }
            code => {
                self.metrics.record_driver_error();
                warn!(
                    "Stream read failed on device {}: driver code {}",
                    device_id, code
                );
                Err(TunerError::Driver {
                    code: i32::try_from(code).unwrap_or(i32::MIN),
                })
            }
        }
    }
}
