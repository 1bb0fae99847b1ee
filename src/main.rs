//! tc74mon host simulator.
//!
//! Runs the poll FSM against a simulated TC74 so the whole sequence can be
//! watched on a workstation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  SimTc74 ─▶ BlockingBus | ThreadedBus   (TransferPort)   │
//! │  StdTimer                               (TimerPort)      │
//! │  PinIndicator<SimPin>                   (StatusIndicator)│
//! │  LogEventSink | JsonSampleSink          (EventSink)      │
//! │                                                          │
//! │  ───────────── Port Trait Boundary ──────────────        │
//! │                                                          │
//! │        SensorPoller (FSM · TC74 decoding)                │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use tc74mon::adapters::blocking_bus::BlockingBus;
use tc74mon::adapters::log_sink::LogEventSink;
use tc74mon::adapters::sim_tc74::SimTc74;
use tc74mon::adapters::threaded_bus::ThreadedBus;
use tc74mon::adapters::time::StdTimer;
use tc74mon::app::events::PollEvent;
use tc74mon::app::ports::{EventSink, StatusIndicator, TransferPort};
use tc74mon::app::service::SensorPoller;
use tc74mon::config::PollerConfig;
use tc74mon::drivers::status_led::{PinIndicator, SimPin};

#[derive(Parser)]
#[command(author, version, about = "Run the TC74 poller against a simulated sensor")]
struct Args {
    /// Poller configuration (JSON); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of poll ticks to run (0 = until halted)
    #[arg(short = 'n', long, default_value_t = 200)]
    ticks: u64,

    /// Pause between poll ticks in milliseconds
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Simulated temperature in °C
    #[arg(short, long, default_value_t = 24, allow_negative_numbers = true)]
    temperature: i8,

    /// Start the sensor in standby
    #[arg(long)]
    standby: bool,

    /// RWCR reads reporting "converting" after power-up
    #[arg(long, default_value_t = 0)]
    powering_up: u8,

    /// Leave the sensor off the bus (probe NAK)
    #[arg(long)]
    absent: bool,

    /// Complete transfers on a worker thread instead of inline
    #[arg(long)]
    threaded: bool,

    /// Worker-thread transfer latency in milliseconds
    #[arg(long, default_value_t = 2)]
    latency_ms: u64,

    /// Print samples as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

/// Writes each temperature sample to stdout as one JSON line and forwards
/// everything to the log sink.
struct JsonSampleSink {
    log: LogEventSink,
}

impl EventSink for JsonSampleSink {
    fn emit(&mut self, event: &PollEvent) {
        if let PollEvent::Sample(sample) = event {
            match serde_json::to_string(sample) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("sample encode failed: {}", e),
            }
        }
        self.log.emit(event);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PollerConfig> {
    let Some(path) = path else {
        info!("Config: defaults");
        return Ok(PollerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = PollerConfig::from_json(&text)?;
    info!("Config loaded from {}", path.display());
    Ok(config)
}

fn run<B: TransferPort>(bus: B, config: PollerConfig, args: &Args) -> Result<()> {
    let timer = StdTimer::new();
    let led = Arc::new(PinIndicator::new(SimPin::new()));
    let mut poller = SensorPoller::new(config, bus, timer, led);
    poller.initialize();

    let mut log_sink = LogEventSink::new();
    let mut json_sink = JsonSampleSink {
        log: LogEventSink::new(),
    };
    let period = Duration::from_millis(args.tick_ms);

    let mut ticks = 0u64;
    while args.ticks == 0 || ticks < args.ticks {
        if args.json {
            poller.tick(&mut json_sink);
        } else {
            poller.tick(&mut log_sink);
        }
        ticks += 1;
        if poller.is_halted() {
            break;
        }
        thread::sleep(period);
    }

    info!(
        "Stopped after {} ticks ({} us): state={:?} samples={} status={:?} led={}",
        ticks,
        poller.timer().uptime_us(),
        poller.state(),
        poller.sample_count(),
        poller.last_status(),
        if poller.led().is_on() { "on" } else { "off" },
    );
    if let Some((fault, state)) = poller.fault() {
        anyhow::bail!("poller halted in {:?}: {}", state, fault);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(args.config.as_ref())?;

    let mut sensor = SimTc74::new(config.address, args.temperature).powering_up(args.powering_up);
    if args.standby {
        sensor = sensor.in_standby();
    }
    if args.absent {
        sensor.set_present(false);
    }

    if args.threaded {
        let bus = ThreadedBus::spawn(
            sensor,
            config.bus_channel,
            Duration::from_millis(args.latency_ms),
        )
        .context("spawning i2c worker")?;
        run(bus, config, &args)
    } else {
        run(BlockingBus::new(sensor, config.bus_channel), config, &args)
    }
}
