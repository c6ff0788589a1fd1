//! CLI Entry Point for tc-daq
//!
//! Polls a thermocouple DAQ at a fixed interval, prints each reading and writes
//! every reading of the run to CSV when the run ends.
//!
//! # Usage
//!
//! ```bash
//! tc-daq --channels 0,1,2 --interval 1s --output test_temps.csv
//! tc-daq --config config/default.toml --samples 60
//! ```
//!
//! Press Ctrl+C to stop; the CSV is written on every exit path.
//!
//! No vendor SDK is linked: the binary runs against the simulated device from
//! `tc_daq::hardware::mock`.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info};

use tc_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use tc_daq::display::{ConsoleDisplay, SeriesDisplay};
use tc_daq::hardware::MockThermocoupleDaq;
use tc_daq::session::DeviceSession;
use tc_daq::shutdown::ShutdownSignal;
use tc_daq::{logging, shutdown_channel, AcquisitionRun, Channel, CsvSink, NumericPolicy, Sampler};

#[derive(Parser)]
#[command(name = "tc-daq")]
#[command(about = "Fixed-interval thermocouple acquisition to CSV", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Channels to poll, comma separated (e.g. 0,1,2,3,5,6)
    #[arg(long, value_delimiter = ',')]
    channels: Option<Vec<u32>>,

    /// Wait between readings (e.g. 1s, 500ms)
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    interval: Option<Duration>,

    /// CSV file written when the run ends
    #[arg(long)]
    output: Option<PathBuf>,

    /// Stop after this many readings
    #[arg(long)]
    samples: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Store readings unmodified instead of truncating to integers
    #[arg(long)]
    raw: bool,

    /// Wait for ENTER before the first reading
    #[arg(long)]
    wait_for_enter: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(channels) = &self.channels {
            settings.acquisition.channels = channels.iter().copied().map(Channel::new).collect();
        }
        if let Some(interval) = self.interval {
            settings.acquisition.interval = interval;
        }
        if let Some(output) = &self.output {
            settings.storage.output_path = output.clone();
        }
        if self.samples.is_some() {
            settings.acquisition.max_samples = self.samples;
        }
        if let Some(level) = &self.log_level {
            settings.application.log_level = level.clone();
        }
        if self.raw {
            settings.acquisition.numeric_policy = NumericPolicy::Raw;
        }
        if self.wait_for_enter {
            settings.device.wait_for_enter = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut settings);
    settings.validate()?;

    if cli.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    logging::init_from_settings(&settings)?;

    let daq = MockThermocoupleDaq::new();
    let mut session = DeviceSession::open(
        &daq,
        &daq,
        &settings.device.product_filter,
        settings.device.flash_count,
    )
    .await?;

    // Installed before any prompt so an interrupt always reaches close().
    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping acquisition");
                trigger.trigger();
            }
            Err(e) => error!(error = %e, "Unable to listen for Ctrl+C"),
        }
    });

    let outcome = acquire(&settings, &session, &daq, signal).await;
    session.close_after(outcome).await
}

async fn acquire(
    settings: &Settings,
    session: &DeviceSession<'_, MockThermocoupleDaq>,
    daq: &MockThermocoupleDaq,
    mut signal: ShutdownSignal,
) -> Result<()> {
    let channels = &settings.acquisition.channels;
    let options = settings.channel_options.clone();
    session.configure_channels(channels, &options).await?;

    let mut sampler = Sampler::new(daq, options.clone())
        .with_numeric_policy(settings.acquisition.numeric_policy);
    sampler.configure(channels.iter().copied())?;

    info!(
        device = %session.descriptor().product_name,
        input_mode = ?options.input_mode,
        scale = %options.scale,
        "Device ready"
    );
    println!("Please enter CTRL + C to terminate the process");

    if settings.device.wait_for_enter {
        println!("\nHit ENTER to continue");
        match signal.run_until_cancelled(wait_for_enter()).await {
            Some(entered) => entered?,
            None => info!("Interrupted before the first reading"),
        }
    }

    let display: Box<dyn SeriesDisplay> =
        Box::new(ConsoleDisplay::stdout().with_unit(options.scale.unit()));
    let mut run = AcquisitionRun::new(
        sampler,
        display,
        CsvSink::new(),
        &settings.storage.output_path,
        settings.acquisition.interval,
    );
    if let Some(max) = settings.acquisition.max_samples {
        run = run.with_max_ticks(max);
    }

    // An interrupt at the prompt leaves the signal set, so the run drains at
    // once and still writes the header.
    let summary = run.run(signal).await?;
    info!(
        rows = summary.rows,
        path = %summary.destination.display(),
        termination = ?summary.termination,
        "Acquisition finished"
    );
    if summary.termination.is_failure() {
        error!(termination = ?summary.termination, "Run stopped on acquisition failure");
    }
    Ok(())
}

/// Block a detached thread on stdin until a line arrives.
///
/// The thread is not joined: if the wait is abandoned the runtime can still
/// shut down while the read is pending.
async fn wait_for_enter() -> Result<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line).map(|_| ());
        let _ = tx.send(read);
    });
    rx.await.context("stdin reader exited")??;
    Ok(())
}
