//! Command-line arguments and configuration file handling.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Deserialize;

use usbtuner_core::{MAX_CHUNK_SIZE, ts::DEFAULT_READ_TIMEOUT};

pub const DEFAULT_DEVICE_ID: u64 = 0;
pub const DEFAULT_FREQUENCY_HZ: u32 = 473_000_000;
pub const DEFAULT_MODULATION: &str = "8VSB";
pub const DEFAULT_OUTPUT: &str = "capture.ts";

/// usbtuner-capture - record a transport stream from a simulated USB tuner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Device identifier to claim
    #[arg(short, long)]
    pub device_id: Option<u64>,

    /// Frequency to tune, in Hz
    #[arg(short, long)]
    pub frequency: Option<u32>,

    /// Modulation of the target channel (8VSB, QAM64, QAM256)
    #[arg(short, long)]
    pub modulation: Option<String>,

    /// Output file for the captured stream
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Capture duration in seconds; runs until Ctrl-C when omitted
    #[arg(short = 't', long)]
    pub duration: Option<u64>,

    /// Extra PID to filter, repeatable; base PSI/SI filters are always installed
    #[arg(long = "pid")]
    pub pids: Vec<u16>,

    /// Carrier frequency the simulated tuner locks, repeatable; locks any when omitted
    #[arg(long = "carrier")]
    pub carriers: Vec<u32>,

    /// Per-read timeout handed to the driver, in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Read buffer size in bytes; values beyond one chunk are capped per read
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Configuration file path (TOML format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub simulator: SimulatorSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct CaptureSection {
    pub device_id: Option<u64>,
    pub frequency: Option<u32>,
    pub modulation: Option<String>,
    pub output: Option<PathBuf>,
    pub duration_secs: Option<u64>,
    pub pids: Option<Vec<u16>>,
    pub read_timeout_ms: Option<u64>,
    pub buffer_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SimulatorSection {
    pub carriers: Option<Vec<u32>>,
}

pub fn load_config(path: &PathBuf) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config)
}

/// Effective settings after merging command line, config file and defaults.
/// Command-line arguments take precedence over the file.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device_id: u64,
    pub frequency: u32,
    pub modulation: String,
    pub output: PathBuf,
    pub duration: Option<Duration>,
    pub pids: Vec<u16>,
    pub carriers: Vec<u32>,
    pub read_timeout: Duration,
    pub buffer_size: usize,
}

impl CaptureConfig {
    pub fn resolve(args: Args, file: ConfigFile) -> Self {
        let capture = file.capture;
        let simulator = file.simulator;

        let duration_secs = args.duration.or(capture.duration_secs);
        let read_timeout_ms = args.read_timeout_ms.or(capture.read_timeout_ms);

        let pids = if args.pids.is_empty() {
            capture.pids.unwrap_or_default()
        } else {
            args.pids
        };
        let carriers = if args.carriers.is_empty() {
            simulator.carriers.unwrap_or_default()
        } else {
            args.carriers
        };

        CaptureConfig {
            device_id: args
                .device_id
                .or(capture.device_id)
                .unwrap_or(DEFAULT_DEVICE_ID),
            frequency: args
                .frequency
                .or(capture.frequency)
                .unwrap_or(DEFAULT_FREQUENCY_HZ),
            modulation: args
                .modulation
                .or(capture.modulation)
                .unwrap_or_else(|| DEFAULT_MODULATION.to_string()),
            output: args
                .output
                .or(capture.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            duration: duration_secs.map(Duration::from_secs),
            pids,
            carriers,
            read_timeout: read_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_READ_TIMEOUT),
            buffer_size: args
                .buffer_size
                .or(capture.buffer_size)
                .unwrap_or(MAX_CHUNK_SIZE),
        }
    }

    /// Absolute deadline for a capture starting at `started`.
    ///
    /// `None` when no duration is configured, or when the duration does not
    /// fit the clock's representable range; the capture then runs until
    /// Ctrl-C.
    pub fn deadline(&self, started: Instant) -> Option<Instant> {
        self.duration.and_then(|duration| started.checked_add(duration))
    }
}
