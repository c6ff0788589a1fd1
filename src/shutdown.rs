//! Orderly shutdown of an acquisition run.
//!
//! An [`AcquisitionRun`] polls its sampler at a fixed interval until an
//! operator interrupt, an acquisition failure or an optional tick limit ends
//! the run. Whatever ends it, the run then drains: the sampler is finalized
//! once and the sink is called once with everything acquired.
//!
//! ```text
//! Running --(interrupt | failure | limit)--> Draining --(finalize + write)--> Stopped
//! ```
//!
//! The interrupt is delivered through a [`ShutdownTrigger`] / [`ShutdownSignal`]
//! pair backed by a `tokio::sync::watch` channel. Both the inter-tick wait and
//! an in-flight tick are raced against the signal, so an interrupt is honoured
//! promptly. An abandoned tick never appends its row.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::data::sampler::Sampler;
use crate::data::storage::Sink;
use crate::display::SeriesDisplay;
use crate::error::{DaqError, DaqResult};
use crate::hardware::ChannelReader;

/// Create a connected trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Requests shutdown of every run watching the paired signal.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Repeated calls have no further effect.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new signal observing this trigger.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a [`ShutdownTrigger`].
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested. Never resolves if every trigger is
    /// dropped without firing.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `fut` until it completes or shutdown is requested, whichever comes
    /// first. Returns `None` when shutdown won; `fut` is dropped in that case.
    pub async fn run_until_cancelled<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Ticking at the configured interval.
    Running,
    /// No further ticks; finalizing and writing.
    Draining,
    /// Output written. Terminal.
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why ticking stopped.
#[derive(Debug)]
pub enum Termination {
    /// Operator interrupt.
    Cancelled,
    /// Tick limit reached.
    Completed,
    /// A channel read failed; the failing tick was discarded.
    AcquisitionFailed(DaqError),
}

impl Termination {
    /// Whether the run ended because a read failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Termination::AcquisitionFailed(_))
    }
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Data rows written (header excluded).
    pub rows: usize,
    /// Where the output was written.
    pub destination: PathBuf,
    /// Why ticking stopped.
    pub termination: Termination,
}

/// One-shot fixed-interval acquisition with guaranteed output on shutdown.
pub struct AcquisitionRun<R, S> {
    sampler: Sampler<R>,
    display: Box<dyn SeriesDisplay>,
    sink: S,
    destination: PathBuf,
    interval: Duration,
    max_ticks: Option<u64>,
    state: RunState,
}

impl<R: ChannelReader, S: Sink> AcquisitionRun<R, S> {
    /// Assemble a run around a configured sampler.
    pub fn new(
        sampler: Sampler<R>,
        display: Box<dyn SeriesDisplay>,
        sink: S,
        destination: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            sampler,
            display,
            sink,
            destination: destination.into(),
            interval,
            max_ticks: None,
            state: RunState::Running,
        }
    }

    /// Stop on its own after `ticks` successful ticks.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Current coordinator state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The sampler driven by this run.
    pub fn sampler(&self) -> &Sampler<R> {
        &self.sampler
    }

    /// The sink the run writes through.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Output path.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Poll until shutdown, then finalize and write exactly once.
    ///
    /// Acquisition failures end the run but still produce output; they are
    /// reported through [`RunSummary::termination`]. Sink failures are returned
    /// as errors. Calling `run` again after it stopped fails with
    /// [`DaqError::Closed`].
    pub async fn run(&mut self, mut signal: ShutdownSignal) -> DaqResult<RunSummary> {
        if self.state != RunState::Running || self.sampler.is_closed() {
            return Err(DaqError::Closed);
        }
        let labels: Vec<String> = match self.sampler.header() {
            Some(header) => header.labels().to_vec(),
            None => {
                return Err(DaqError::Configuration(
                    "sampler must be configured before the run starts".to_string(),
                ))
            }
        };

        info!(
            interval = ?self.interval,
            channels = labels.len(),
            destination = %self.destination.display(),
            "Acquisition running"
        );

        let termination = self.poll(&mut signal, &labels).await;
        self.transition(RunState::Draining);

        let series = self.sampler.finalize()?;
        let written = self.sink.write(series.header(), &series, &self.destination);
        self.transition(RunState::Stopped);
        written?;

        Ok(RunSummary {
            rows: series.len(),
            destination: self.destination.clone(),
            termination,
        })
    }

    async fn poll(&mut self, signal: &mut ShutdownSignal, labels: &[String]) -> Termination {
        let mut completed: u64 = 0;
        loop {
            if signal.is_triggered() {
                return Termination::Cancelled;
            }

            let tick = tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    info!("Interrupt during tick, abandoning it");
                    return Termination::Cancelled;
                }
                tick = self.sampler.tick() => tick,
            };

            match tick {
                Ok(_) => {
                    completed += 1;
                    match self.sampler.series() {
                        Ok(snapshot) => self.display.render(&snapshot, labels),
                        Err(e) => warn!(error = %e, "Display snapshot unavailable"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Acquisition failed, stopping run");
                    return Termination::AcquisitionFailed(e);
                }
            }

            if self.max_ticks.is_some_and(|max| completed >= max) {
                return Termination::Completed;
            }

            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    info!("Interrupt during wait");
                    return Termination::Cancelled;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Run state change");
        self.state = next;
    }
}
