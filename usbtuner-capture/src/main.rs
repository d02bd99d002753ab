//! usbtuner-capture: record a transport stream from a USB TV tuner device.
//!
//! Builds a tuner manager over the built-in simulator, claims a device
//! handle, tunes and writes the delivered TS chunks to a file until the
//! requested duration elapses or Ctrl-C arrives.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info, warn};

use usbtuner_core::{
    effective_read_size, DeviceId, FilterKind, SimTuner, TunerManager, UsbTuner,
};

mod config;

use config::{load_config, Args, CaptureConfig, ConfigFile};

/// Nominal 8VSB channel payload rate, in bits per second. The simulator
/// produces packets as fast as it is polled, so the capture loop paces
/// itself to this rate instead.
const ATSC_CHANNEL_BITRATE: f64 = 19_390_000.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from("usbtuner-capture.toml");
        default_path.exists().then_some(default_path)
    });
    let file_config = if let Some(path) = &config_path {
        match load_config(path) {
            Ok(file_config) => {
                eprintln!("Loaded config from: {}", path.display());
                file_config
            }
            Err(e) => {
                eprintln!("Failed to load config file {}: {}", path.display(), e);
                return Err(e);
            }
        }
    } else {
        ConfigFile::default()
    };

    let verbose = args.verbose;
    let config = CaptureConfig::resolve(args, file_config);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" }),
    )
    .format_timestamp_millis()
    .init();

    run(config)
}

fn run(config: CaptureConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Capturing device {} at {} Hz ({}) to {}",
        config.device_id,
        config.frequency,
        config.modulation,
        config.output.display()
    );
    if effective_read_size(config.buffer_size) == 0 {
        warn!(
            "Buffer of {} bytes holds no whole TS packet; every read will come back empty",
            config.buffer_size
        );
    }

    let carriers = config.carriers.clone();
    let manager = Arc::new(TunerManager::new(move |_| {
        Box::new(SimTuner::with_carriers(carriers.clone()))
    }));
    let metrics = manager.metrics();

    let mut tuner = UsbTuner::attach(Arc::clone(&manager), DeviceId::new(config.device_id));
    tuner.set_read_timeout(config.read_timeout);

    if !tuner.tune(config.frequency, &config.modulation) {
        error!(
            "Tuner failed to lock at {} Hz ({})",
            config.frequency, config.modulation
        );
        return Err("tune failed".into());
    }
    for &pid in &config.pids {
        if !tuner.add_pid_filter(pid, FilterKind::Other) {
            warn!("Skipping invalid PID 0x{:04x}", pid);
        }
    }

    let output = File::create(&config.output)?;
    let mut writer = BufWriter::new(output);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })?;

    let started = Instant::now();
    let deadline = config.deadline(started);
    let mut buf = vec![0u8; config.buffer_size];
    let mut bytes_written: u64 = 0;

    while running.load(Ordering::SeqCst) {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        match tuner.read_ts_stream(&mut buf) {
            n if n > 0 => {
                writer.write_all(&buf[..n as usize])?;
                bytes_written += n as u64;
                // Pace the unshaped simulator output to the nominal channel rate.
                thread::sleep(Duration::from_secs_f64(
                    n as f64 * 8.0 / ATSC_CHANNEL_BITRATE,
                ));
            }
            0 => {
                // An empty read from a real driver already blocked for the
                // timeout; the simulator returns at once, so wait here.
                thread::sleep(config.read_timeout);
            }
            _ => {
                error!("Stream read failed; stopping capture");
                break;
            }
        }
    }

    tuner.stop_tune();
    tuner.close();
    writer.flush()?;

    metrics.print_report();
    info!(
        "Wrote {} bytes to {} in {:.1}s",
        bytes_written,
        config.output.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
