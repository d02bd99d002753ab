//! Per-device caller handle with sentinel-style returns.
//!
//! This is the outermost surface: everything below speaks typed results,
//! and only here do failures collapse into the `bool`/`i32` sentinels
//! simple callers expect. The handle also carries the caller-side
//! conveniences: modulation-based tune timeouts, the base ATSC section
//! filters installed after every tune, the same-parameters re-tune
//! shortcut, and PID range validation.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::device::DeviceId;
use crate::driver::FilterKind;
use crate::manager::{ReadOutcome, TunerManager};
use crate::ts;

/// Tune timeout for 8VSB (terrestrial) broadcasts.
pub const DEFAULT_VSB_TUNE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Tune timeout for QAM (cable) broadcasts, which lock slower.
pub const DEFAULT_QAM_TUNE_TIMEOUT: Duration = Duration::from_millis(4000);

/// The tune timeout used for a modulation string.
pub fn default_tune_timeout(modulation: &str) -> Duration {
    if modulation == "8VSB" {
        DEFAULT_VSB_TUNE_TIMEOUT
    } else {
        DEFAULT_QAM_TUNE_TIMEOUT
    }
}

/// A caller's handle to one tuner device.
///
/// Bound to a shared [`TunerManager`] and a device identifier; dropping the
/// handle finalizes the session and releases the driver.
pub struct UsbTuner {
    manager: Arc<TunerManager>,
    device_id: DeviceId,
    frequency: Option<u32>,
    modulation: Option<String>,
    streaming: bool,
    read_timeout: Duration,
}

impl UsbTuner {
    /// Attach a handle for `device_id`.
    ///
    /// No driver activity happens until the first [`UsbTuner::tune`].
    pub fn attach(manager: Arc<TunerManager>, device_id: DeviceId) -> Self {
        Self {
            manager,
            device_id,
            frequency: None,
            modulation: None,
            streaming: false,
            read_timeout: ts::DEFAULT_READ_TIMEOUT,
        }
    }

    /// The device this handle is bound to.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Whether filters are armed and the stream is expected to flow.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Override the per-read timeout (default 100 ms).
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Tune to `frequency` with the given modulation.
    ///
    /// The tune timeout follows the modulation (8VSB 2 s, QAM 4 s). On
    /// success the PAT and ATSC SI base section filters are installed so
    /// table data flows immediately. Tuning to the parameters already
    /// locked skips the driver and only re-arms the base filters. Returns
    /// false when the driver cannot lock.
    pub fn tune(&mut self, frequency: u32, modulation: &str) -> bool {
        if self.streaming {
            self.manager.close_all_pid_filters(self.device_id);
            self.streaming = false;
        }

        if self.frequency == Some(frequency) && self.modulation.as_deref() == Some(modulation) {
            debug!(
                "Device {} already tuned to {} Hz ({}); re-arming base filters",
                self.device_id, frequency, modulation
            );
            self.install_base_filters();
            self.streaming = true;
            return true;
        }

        let timeout = default_tune_timeout(modulation);
        match self.manager.tune(self.device_id, frequency, modulation, timeout) {
            Ok(()) => {
                self.install_base_filters();
                self.frequency = Some(frequency);
                self.modulation = Some(modulation.to_string());
                self.streaming = true;
                true
            }
            Err(_) => {
                // Forget the old parameters so the next tune goes to the
                // driver instead of taking the shortcut over a dead tune.
                self.frequency = None;
                self.modulation = None;
                false
            }
        }
    }

    /// Register a PID filter. Returns false for PIDs outside `0..=0x1FFF`
    /// without touching the driver.
    pub fn add_pid_filter(&mut self, pid: u16, kind: FilterKind) -> bool {
        if pid > ts::MAX_PID {
            warn!(
                "Rejecting out-of-range PID 0x{:04x} for device {}",
                pid, self.device_id
            );
            return false;
        }
        self.manager.add_pid_filter(self.device_id, pid, kind);
        true
    }

    /// Read one chunk of TS data into `buf`.
    ///
    /// Returns the byte count (a whole number of 188-byte packets, at most
    /// 1316), 0 when nothing arrived within the read timeout, or -1 on any
    /// failure (unknown device or driver error).
    pub fn read_ts_stream(&mut self, buf: &mut [u8]) -> i32 {
        match self.manager.read_chunk(self.device_id, buf, self.read_timeout) {
            Ok(ReadOutcome::Data(n)) => n as i32,
            Ok(ReadOutcome::NoData) => 0,
            Err(_) => -1,
        }
    }

    /// Close all filters, keeping the tune locked.
    pub fn stop_streaming(&mut self) {
        if self.streaming {
            self.manager.close_all_pid_filters(self.device_id);
            self.streaming = false;
        }
    }

    /// Tear down the tune. The session stays registered for a later tune.
    pub fn stop_tune(&mut self) {
        self.stop_streaming();
        self.manager.stop(self.device_id);
        self.frequency = None;
        self.modulation = None;
    }

    /// Release the handle, finalizing the session.
    pub fn close(self) {}

    fn install_base_filters(&self) {
        self.manager
            .add_pid_filter(self.device_id, ts::PID_PAT, FilterKind::Section);
        self.manager
            .add_pid_filter(self.device_id, ts::PID_ATSC_SI_BASE, FilterKind::Section);
    }
}

impl Drop for UsbTuner {
    fn drop(&mut self) {
        self.manager.finalize(self.device_id);
        info!("Released device {}", self.device_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TunerDriver;
    use crate::session::SessionState;
    use crate::sim::SimTuner;
    use crate::ts::TS_PACKET_SIZE;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingState {
        tune_calls: AtomicUsize,
        tune_timeouts: Mutex<Vec<Duration>>,
        filters: Mutex<Vec<(u16, FilterKind)>>,
    }

    struct CountingDriver {
        state: Arc<CountingState>,
    }

    impl TunerDriver for CountingDriver {
        fn tune(&mut self, _frequency: u32, _modulation: &str, timeout: Duration) -> i32 {
            self.state.tune_calls.fetch_add(1, Ordering::SeqCst);
            self.state.tune_timeouts.lock().push(timeout);
            0
        }
        fn stop_tune(&mut self) {}
        fn add_pid_filter(&mut self, pid: u16, kind: FilterKind) {
            self.state.filters.lock().push((pid, kind));
        }
        fn close_all_pid_filters(&mut self) {
            self.state.filters.lock().clear();
        }
        fn read_stream(&mut self, _buf: &mut [u8], _timeout: Duration) -> isize {
            0
        }
    }

    fn counting_setup() -> (Arc<TunerManager>, Arc<CountingState>) {
        let state = Arc::new(CountingState::default());
        let factory_state = Arc::clone(&state);
        let manager = Arc::new(TunerManager::new(move |_| {
            Box::new(CountingDriver {
                state: Arc::clone(&factory_state),
            })
        }));
        (manager, state)
    }

    fn sim_manager(carriers: &[u32]) -> Arc<TunerManager> {
        let carriers = carriers.to_vec();
        Arc::new(TunerManager::new(move |_| {
            Box::new(SimTuner::with_carriers(carriers.clone()))
        }))
    }

    #[test]
    fn test_tune_reports_driver_lock() {
        let manager = sim_manager(&[473_000_000]);
        let mut tuner = UsbTuner::attach(Arc::clone(&manager), DeviceId::new(1));

        assert!(tuner.tune(473_000_000, "8VSB"));
        assert!(tuner.is_streaming());

        assert!(!tuner.tune(605_000_000, "QAM256"));
        assert!(!tuner.is_streaming());
    }

    #[test]
    fn test_tune_installs_base_filters() {
        let (manager, state) = counting_setup();
        let mut tuner = UsbTuner::attach(manager, DeviceId::new(2));

        assert!(tuner.tune(473_000_000, "8VSB"));
        assert_eq!(
            *state.filters.lock(),
            vec![
                (ts::PID_PAT, FilterKind::Section),
                (ts::PID_ATSC_SI_BASE, FilterKind::Section),
            ]
        );
    }

    #[test]
    fn test_retune_same_parameters_skips_driver() {
        let (manager, state) = counting_setup();
        let mut tuner = UsbTuner::attach(manager, DeviceId::new(3));

        assert!(tuner.tune(473_000_000, "8VSB"));
        assert!(tuner.tune(473_000_000, "8VSB"));

        // One driver tune; the second call only re-armed the base filters.
        assert_eq!(state.tune_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.filters.lock().len(), 2);
    }

    #[test]
    fn test_tune_timeout_follows_modulation() {
        let (manager, state) = counting_setup();
        let mut tuner = UsbTuner::attach(manager, DeviceId::new(4));

        tuner.tune(473_000_000, "8VSB");
        tuner.tune(605_000_000, "QAM256");

        assert_eq!(
            *state.tune_timeouts.lock(),
            vec![DEFAULT_VSB_TUNE_TIMEOUT, DEFAULT_QAM_TUNE_TIMEOUT]
        );
    }

    #[test]
    fn test_default_tune_timeout_values() {
        assert_eq!(default_tune_timeout("8VSB"), Duration::from_millis(2000));
        assert_eq!(default_tune_timeout("QAM256"), Duration::from_millis(4000));
        assert_eq!(default_tune_timeout("QAM64"), Duration::from_millis(4000));
    }

    #[test]
    fn test_add_pid_filter_validates_range() {
        let (manager, state) = counting_setup();
        let mut tuner = UsbTuner::attach(manager, DeviceId::new(5));
        tuner.tune(473_000_000, "8VSB");

        assert!(!tuner.add_pid_filter(0x2000, FilterKind::Video));
        assert_eq!(state.filters.lock().len(), 2);

        assert!(tuner.add_pid_filter(ts::MAX_PID, FilterKind::Video));
        assert_eq!(state.filters.lock().len(), 3);
    }

    #[test]
    fn test_read_sentinels() {
        let manager = sim_manager(&[473_000_000]);
        let mut tuner = UsbTuner::attach(Arc::clone(&manager), DeviceId::new(6));
        let mut buf = [0u8; 1500];

        // No session yet.
        assert_eq!(tuner.read_ts_stream(&mut buf), -1);

        assert!(tuner.tune(473_000_000, "8VSB"));
        assert_eq!(tuner.read_ts_stream(&mut buf), 1316);

        // Filters closed: the simulator has nothing to deliver.
        tuner.stop_streaming();
        assert_eq!(tuner.read_ts_stream(&mut buf), 0);
    }

    #[test]
    fn test_stop_tune_keeps_session_registered() {
        let manager = sim_manager(&[473_000_000]);
        let mut tuner = UsbTuner::attach(Arc::clone(&manager), DeviceId::new(7));
        tuner.tune(473_000_000, "8VSB");

        tuner.stop_tune();
        assert!(!tuner.is_streaming());
        assert_eq!(
            manager.session_state(DeviceId::new(7)),
            Some(SessionState::Stopped)
        );
    }

    #[test]
    fn test_drop_finalizes_session() {
        let manager = sim_manager(&[473_000_000]);
        {
            let mut tuner = UsbTuner::attach(Arc::clone(&manager), DeviceId::new(8));
            tuner.tune(473_000_000, "8VSB");
            assert_eq!(manager.session_count(), 1);
        }
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_full_streaming_sequence() {
        let manager = sim_manager(&[473_000_000]);
        let id = DeviceId::new(9);
        let mut tuner = UsbTuner::attach(Arc::clone(&manager), id);

        assert!(tuner.tune(473_000_000, "8VSB"));
        assert!(tuner.add_pid_filter(0x21, FilterKind::Section));

        let mut buf = [0u8; 1500];
        let n = tuner.read_ts_stream(&mut buf);
        assert!(n >= 0);
        assert!(n as usize <= 1316);
        assert_eq!(n as usize % TS_PACKET_SIZE, 0);

        tuner.stop_tune();
        tuner.close();

        // The identifier is unknown again after close.
        let mut reattached = UsbTuner::attach(Arc::clone(&manager), id);
        assert_eq!(reattached.read_ts_stream(&mut buf), -1);
    }
}
