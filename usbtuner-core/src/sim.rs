//! Software tuner driver for development and tests.

use std::collections::HashMap;
use std::time::Duration;

use crate::driver::{FilterKind, TunerDriver};
use crate::ts::{TS_PACKET_SIZE, TS_SYNC_BYTE};

/// A tuner that exists only in software.
///
/// It locks onto a configurable set of carrier frequencies, honors PID
/// filters, and synthesizes well-formed TS packets (sync byte, PID header
/// bits, per-PID continuity counters) for every registered filter in round
/// robin. Reads return immediately; a hardware driver would block up to its
/// timeout instead.
pub struct SimTuner {
    /// Frequencies the frontend can lock onto; empty means any.
    carriers: Vec<u32>,
    tuned: bool,
    filters: Vec<(u16, FilterKind)>,
    continuity: HashMap<u16, u8>,
    read_failure: Option<i32>,
}

impl SimTuner {
    /// A tuner that locks onto any frequency.
    pub fn new() -> Self {
        Self {
            carriers: Vec::new(),
            tuned: false,
            filters: Vec::new(),
            continuity: HashMap::new(),
            read_failure: None,
        }
    }

    /// A tuner that only locks onto the given carrier frequencies.
    pub fn with_carriers(carriers: impl IntoIterator<Item = u32>) -> Self {
        Self {
            carriers: carriers.into_iter().collect(),
            ..Self::new()
        }
    }

    /// Make every subsequent read fail with `code` (must be negative to be
    /// treated as an error by the layers above).
    pub fn fail_reads_with(&mut self, code: i32) {
        self.read_failure = Some(code);
    }

    /// Registered filters, in registration order.
    pub fn filters(&self) -> &[(u16, FilterKind)] {
        &self.filters
    }

    fn write_packet(&mut self, packet: &mut [u8], pid: u16) {
        let cc = self.continuity.entry(pid).or_insert(0);
        packet[0] = TS_SYNC_BYTE;
        packet[1] = ((pid >> 8) & 0x1f) as u8;
        packet[2] = (pid & 0xff) as u8;
        // No scrambling, payload only, 4-bit continuity counter.
        packet[3] = 0x10 | *cc;
        *cc = (*cc + 1) & 0x0f;
        for byte in &mut packet[4..] {
            *byte = 0xff;
        }
    }
}

impl Default for SimTuner {
    fn default() -> Self {
        Self::new()
    }
}

impl TunerDriver for SimTuner {
    fn tune(&mut self, frequency: u32, _modulation: &str, _timeout: Duration) -> i32 {
        if self.carriers.is_empty() || self.carriers.contains(&frequency) {
            self.tuned = true;
            0
        } else {
            self.tuned = false;
            -1
        }
    }

    fn stop_tune(&mut self) {
        self.tuned = false;
        self.filters.clear();
    }

    fn add_pid_filter(&mut self, pid: u16, kind: FilterKind) {
        self.filters.push((pid, kind));
    }

    fn close_all_pid_filters(&mut self) {
        self.filters.clear();
    }

    fn read_stream(&mut self, buf: &mut [u8], _timeout: Duration) -> isize {
        if let Some(code) = self.read_failure {
            return code as isize;
        }
        let packets = buf.len() / TS_PACKET_SIZE;
        if !self.tuned || self.filters.is_empty() || packets == 0 {
            return 0;
        }
        for index in 0..packets {
            let (pid, _) = self.filters[index % self.filters.len()];
            let start = index * TS_PACKET_SIZE;
            self.write_packet(&mut buf[start..start + TS_PACKET_SIZE], pid);
        }
        (packets * TS_PACKET_SIZE) as isize
    }
}
