//! Session management and TS streaming core for USB-attached ATSC/DVB tuners.
//!
//! The crate sits between simple callers and a tuner driver: it maps opaque
//! device identifiers to live tuning sessions, forwards PID-filter
//! registration, and services chunked transport-stream reads with
//! packet-aligned, MTU-bounded sizing.
//!
//! # Layers
//!
//! - [`TunerDriver`]: the contract a device implementation satisfies;
//!   [`SimTuner`] is the bundled software implementation.
//! - [`TunerManager`]: the session registry and streaming adapter, speaking
//!   typed results.
//! - [`UsbTuner`]: the per-device caller handle, collapsing failures into
//!   the `bool`/`i32` sentinels simple callers expect.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use usbtuner_core::{DeviceId, FilterKind, SimTuner, TunerManager, UsbTuner};
//!
//! let manager = Arc::new(TunerManager::new(|_| Box::new(SimTuner::new())));
//! let mut tuner = UsbTuner::attach(Arc::clone(&manager), DeviceId::new(1));
//!
//! assert!(tuner.tune(473_000_000, "8VSB"));
//! assert!(tuner.add_pid_filter(0x21, FilterKind::Section));
//!
//! let mut buf = [0u8; 1500];
//! // Seven whole packets fit a 1500-byte buffer.
//! assert_eq!(tuner.read_ts_stream(&mut buf), 1316);
//! ```

pub mod device;
pub mod driver;
pub mod error;
pub mod interface;
pub mod manager;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod sim;
pub mod ts;

pub use device::DeviceId;
pub use driver::{DriverFactory, FilterKind, TunerDriver};
pub use error::TunerError;
pub use interface::{
    default_tune_timeout, UsbTuner, DEFAULT_QAM_TUNE_TIMEOUT, DEFAULT_VSB_TUNE_TIMEOUT,
};
pub use manager::{ReadOutcome, TunerManager};
pub use metrics::TunerMetrics;
pub use registry::{SessionRef, SessionRegistry};
pub use session::{SessionState, TunerSession};
pub use sim::SimTuner;
pub use ts::{effective_read_size, MAX_CHUNK_SIZE, TS_PACKET_SIZE};
