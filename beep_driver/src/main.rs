//! # beepd
//!
//! Attaches the beeper described by the configuration file and relays
//! commands from stdin to its device node until EOF or Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Simulated line, default 3 s ring
//! beepd --simulate
//!
//! # Real hardware on /dev/gpiochip0 line 18
//! beepd --config /etc/beep/beep.toml
//!
//! # Shorter ring, verbose JSON logs
//! beepd -s --ringing-ms 500 -v --json
//! ```
//!
//! # Commands
//!
//! | Input    | Effect                                  |
//! |----------|-----------------------------------------|
//! | `1`      | energize, re-arm auto-shutoff           |
//! | `0`      | de-energize                             |
//! | `r`      | print the level (`0` / `1`)             |
//! | `status` | print the device status as JSON         |
//! | `q`      | detach and exit                         |
//!
//! Any other line is written to the node as-is; the device ignores it.

#![deny(warnings)]

use beep_common::config::{BeepConfig, ConfigLoader, GpioBackend};
use beep_common::consts::DEFAULT_CONFIG_PATH;
use beep_driver::drivers::provider_for;
use beep_driver::{BeepPlatformDriver, CharDeviceRegistry, HardwareUnit};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often the command loop checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// beepd - timed GPIO beeper as a character device
#[derive(Parser, Debug)]
#[command(name = "beepd")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Timed GPIO beeper exposed as a byte-oriented device")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file. Defaults are used if it does not exist.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulation backend
    #[arg(short = 's', long)]
    simulate: bool,

    /// Override the GPIO chip device path
    #[arg(long, value_name = "PATH")]
    chip: Option<PathBuf>,

    /// Override the GPIO line offset
    #[arg(long, value_name = "OFFSET")]
    line: Option<u32>,

    /// Override the auto-shutoff duration in milliseconds
    #[arg(long, value_name = "MS")]
    ringing_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("beepd failed: {}", e);
        eprintln!("beepd: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    setup_tracing(&args, &config);
    info!("beepd v{} starting...", env!("CARGO_PKG_VERSION"));

    let provider = provider_for(config.gpio.backend)?;
    let registry = Arc::new(CharDeviceRegistry::new());
    let mut driver = BeepPlatformDriver::new(
        config.device.clone(),
        provider,
        registry.clone(),
    );

    let unit = HardwareUnit::from_config(&config);
    let node = driver.probe(&unit)?.node().to_string();

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let result = serve(&registry, &driver, &node, &running);

    driver.remove();
    info!("beepd shutdown complete");
    result
}

/// Load the config file (or defaults) and apply CLI overrides.
fn load_config(args: &Args) -> Result<BeepConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        BeepConfig::load(&args.config)?
    } else {
        BeepConfig::default()
    };

    if args.simulate {
        config.gpio.backend = GpioBackend::Simulation;
    }
    if let Some(chip) = &args.chip {
        config.gpio.chip = chip.clone();
    }
    if let Some(line) = args.line {
        config.gpio.line = line;
    }
    if let Some(ms) = args.ringing_ms {
        config.device.ringing_duration_ms = ms;
    }

    config.validate()?;
    Ok(config)
}

/// Relay stdin commands to the device node until EOF, `q` or Ctrl-C.
fn serve(
    registry: &CharDeviceRegistry,
    driver: &BeepPlatformDriver,
    node: &str,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = registry.open(node)?;
    info!("Serving /dev/{} (type 1, 0, r, status, q)", node);

    let (tx, rx) = mpsc::channel::<String>();
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    while running.load(Ordering::SeqCst) {
        let line = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match line.trim() {
            "" => {}
            "q" | "quit" => break,
            "r" | "read" => {
                let mut buf = [0u8; 1];
                file.read(&mut buf)?;
                println!("{}", buf[0] as char);
            }
            "status" => match driver.device() {
                Some(device) => println!("{}", serde_json::to_string(&device.status())?),
                None => warn!("No device bound"),
            },
            command => {
                file.write(command.as_bytes())?;
            }
        }
    }

    Ok(())
}

/// Setup tracing subscriber from config and CLI arguments.
fn setup_tracing(args: &Args, config: &BeepConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        config.shared.log_level.as_filter()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
