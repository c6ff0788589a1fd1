//! Hardware Abstraction Layer
//!
//! Device access is split into small capability traits (see [`capabilities`]) so
//! the acquisition core only depends on what it calls: a channel reader. Device
//! discovery and connection handling belong to the surrounding application.
//!
//! # Modules
//!
//! - `capabilities` - `ChannelReader`, `DeviceLifecycle`, `DeviceInventory`
//! - `mock` - simulated thermocouple DAQ implementing every capability

pub mod capabilities;
pub mod mock;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use capabilities::{ChannelReader, DeviceDescriptor, DeviceInventory, DeviceLifecycle};
pub use mock::MockThermocoupleDaq;

/// Thermocouple junction type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermocoupleType {
    /// Type J (iron / constantan)
    J,
    /// Type K (chromel / alumel)
    #[default]
    K,
    /// Type T (copper / constantan)
    T,
    /// Type E (chromel / constantan)
    E,
    /// Type R (platinum-rhodium 13%)
    R,
    /// Type S (platinum-rhodium 10%)
    S,
    /// Type B (platinum-rhodium 30% / 6%)
    B,
    /// Type N (nicrosil / nisil)
    N,
}

/// Unit readings are reported in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureScale {
    /// Degrees Celsius
    Celsius,
    /// Degrees Fahrenheit
    #[default]
    Fahrenheit,
    /// Kelvin
    Kelvin,
}

impl TemperatureScale {
    /// Converts a Celsius temperature into this scale.
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            TemperatureScale::Celsius => celsius,
            TemperatureScale::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            TemperatureScale::Kelvin => celsius + 273.15,
        }
    }

    /// Short unit suffix for display.
    pub fn unit(self) -> &'static str {
        match self {
            TemperatureScale::Celsius => "C",
            TemperatureScale::Fahrenheit => "F",
            TemperatureScale::Kelvin => "K",
        }
    }
}

impl fmt::Display for TemperatureScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemperatureScale::Celsius => "celsius",
            TemperatureScale::Fahrenheit => "fahrenheit",
            TemperatureScale::Kelvin => "kelvin",
        };
        f.write_str(name)
    }
}

/// Analog input wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// CHxH / CHxL pair
    #[default]
    Differential,
    /// Single-ended against ground
    SingleEnded,
}

/// Per-channel acquisition options handed to the channel reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOptions {
    /// Thermocouple junction type
    #[serde(default)]
    pub thermocouple: ThermocoupleType,
    /// ADC data rate in Hz
    #[serde(default = "default_data_rate_hz")]
    pub data_rate_hz: u32,
    /// Open-thermocouple detection
    #[serde(default = "default_open_detect")]
    pub open_detect: bool,
    /// Reporting scale
    #[serde(default)]
    pub scale: TemperatureScale,
    /// Input wiring
    #[serde(default)]
    pub input_mode: InputMode,
}

fn default_data_rate_hz() -> u32 {
    60
}

fn default_open_detect() -> bool {
    true
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            thermocouple: ThermocoupleType::default(),
            data_rate_hz: default_data_rate_hz(),
            open_detect: default_open_detect(),
            scale: TemperatureScale::default(),
            input_mode: InputMode::default(),
        }
    }
}
