//! # tc_daq Core Library
//!
//! Fixed-interval thermocouple acquisition. A [`data::sampler::Sampler`] polls a
//! channel reader once per tick and appends one row per tick to an append-only
//! series; when the run ends the series is written to CSV exactly once.
//!
//! ## Crate Structure
//!
//! - **`data`**: the series model (`Channel`, `Row`, `Series`), the `Sampler`
//!   that owns it, and the `Sink` storage writers (CSV).
//! - **`shutdown`**: the `AcquisitionRun` coordinator, which turns an operator
//!   interrupt into `Running -> Draining -> Stopped`.
//! - **`hardware`**: capability traits the core consumes (`ChannelReader`,
//!   `DeviceLifecycle`, `DeviceInventory`) and a simulated thermocouple DAQ.
//! - **`session`**: discovery, connection and release of the acquisition device.
//! - **`display`**: live views of the growing series.
//! - **`config`**: layered `Settings` loaded with figment.
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: the `DaqError` enum shared by every module.

pub mod config;
pub mod data;
pub mod display;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod session;
pub mod shutdown;

pub use data::sampler::{Sampler, SeriesReader};
pub use data::series::{Channel, Header, NumericPolicy, Row, Sample, Series};
pub use data::storage::{CsvSink, Sink};
pub use error::{DaqError, DaqResult};
pub use shutdown::{shutdown_channel, AcquisitionRun, RunState, RunSummary, Termination};
