//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a single place for every failure the
//! acquisition core can surface to its caller.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`**: The channel list or a configuration value is invalid.
//!   Raised before any tick is taken and always fatal.
//! - **`Acquisition`**: One channel read failed during a tick. Carries the failing
//!   channel and the collaborator's underlying cause. The tick appends nothing.
//! - **`Closed`**: A tick, finalize or run was attempted after the sampler or run
//!   had already been closed. A usage error.
//! - **`Io`**: The sink could not write the CSV output. Never retried.
//! - **`ConfigLoad`**: Wraps errors from `figment` while reading the TOML file or
//!   environment overrides.
//! - **`Device`**: Discovery or lifecycle failure raised by the device session.
//!
//! Collaborator traits (channel readers, devices) report `anyhow::Error`; the core
//! wraps those into the variant that names what was being attempted.

use crate::data::series::Channel;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type DaqResult<T> = std::result::Result<T, DaqError>;

/// Every failure the acquisition core reports.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Invalid channel list or configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A single channel read failed; the tick was discarded.
    #[error("Acquisition failed on {channel}: {source}")]
    Acquisition {
        /// Channel whose read failed.
        channel: Channel,
        /// Cause reported by the channel reader.
        #[source]
        source: anyhow::Error,
    },

    /// The sampler has been finalized or the run has stopped.
    #[error("Sampler is closed; no further ticks are permitted")]
    Closed,

    /// Sink write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file or environment could not be parsed.
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] figment::Error),

    /// Device discovery or lifecycle failure.
    #[error("Device error: {0}")]
    Device(String),
}

impl DaqError {
    /// Builds an acquisition error for `channel`.
    pub fn acquisition(channel: Channel, source: impl Into<anyhow::Error>) -> Self {
        DaqError::Acquisition {
            channel,
            source: source.into(),
        }
    }

    /// Returns the failing channel for acquisition errors.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            DaqError::Acquisition { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

impl From<csv::Error> for DaqError {
    fn from(value: csv::Error) -> Self {
        DaqError::Io(value.into())
    }
}
