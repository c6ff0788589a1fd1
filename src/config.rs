//! Configuration System using Figment
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`Settings::default()`)
//! 2. A TOML file (`config/default.toml` unless another path is given)
//! 3. Environment variables prefixed with `TC_DAQ_`, nested keys separated by
//!    a double underscore
//!
//! # Example
//! ```no_run
//! use tc_daq::config::Settings;
//!
//! // TC_DAQ_ACQUISITION__INTERVAL=500ms overrides the file
//! let settings = Settings::load_from("config/default.toml")?;
//! settings.validate()?;
//! println!("Polling {} channels", settings.acquisition.channels.len());
//! # Ok::<(), tc_daq::error::DaqError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data::sampler::validate_channels;
use crate::data::series::{Channel, NumericPolicy};
use crate::error::{DaqError, DaqResult};
use crate::hardware::ChannelOptions;
use crate::logging::OutputFormat;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "TC_DAQ_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Application settings
    pub application: ApplicationSettings,
    /// Polling loop settings
    pub acquisition: AcquisitionSettings,
    /// Device selection
    pub device: DeviceSettings,
    /// Options applied to every channel
    pub channel_options: ChannelOptions,
    /// Output settings
    pub storage: StorageSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Compact,
        }
    }
}

/// Polling loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Channels to poll, in column order
    pub channels: Vec<Channel>,
    /// Wait between ticks, e.g. "1s" or "250ms"
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// How readings are stored
    pub numeric_policy: NumericPolicy,
    /// Stop after this many ticks (runs until interrupted when unset)
    pub max_samples: Option<u64>,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            channels: [0, 1, 2, 3, 5, 6].into_iter().map(Channel::new).collect(),
            interval: Duration::from_secs(1),
            numeric_policy: NumericPolicy::Truncate,
            max_samples: None,
        }
    }
}

/// Device selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Substring the product name must contain
    pub product_filter: String,
    /// Indicator flashes after connecting (0 disables)
    pub flash_count: u32,
    /// Wait for ENTER before the first tick
    pub wait_for_enter: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            product_filter: "USB-2408".to_string(),
            flash_count: 5,
            wait_for_enter: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// CSV file written when the run ends
    pub output_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("test_temps.csv"),
        }
    }
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment
    pub fn load() -> DaqResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DaqResult<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// The layered provider stack, exposed for callers adding their own layers
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> DaqResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        validate_channels(&self.acquisition.channels)?;

        if self.acquisition.interval.is_zero() {
            return Err(DaqError::Configuration(
                "acquisition interval must be greater than zero".to_string(),
            ));
        }

        if self.acquisition.max_samples == Some(0) {
            return Err(DaqError::Configuration(
                "max_samples must be at least 1 when set".to_string(),
            ));
        }

        if self.channel_options.data_rate_hz == 0 {
            return Err(DaqError::Configuration(
                "data_rate_hz must be greater than zero".to_string(),
            ));
        }

        if self.storage.output_path.as_os_str().is_empty() {
            return Err(DaqError::Configuration(
                "output_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> DaqResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DaqError::Configuration(format!("cannot render settings: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{TemperatureScale, ThermocoupleType};

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.acquisition.channels.len(), 6);
        assert_eq!(settings.acquisition.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_load_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "daq.toml",
                r#"
                [acquisition]
                channels = [0, 1, 2]
                interval = "250ms"
                numeric_policy = "raw"

                [channel_options]
                thermocouple = "J"
                scale = "celsius"

                [storage]
                output_path = "runs/bench.csv"
                "#,
            )?;
            jail.set_env("TC_DAQ_DEVICE__FLASH_COUNT", "2");
            jail.set_env("TC_DAQ_ACQUISITION__MAX_SAMPLES", "10");

            let settings = Settings::load_from("daq.toml").map_err(|e| e.to_string())?;
            assert_eq!(
                settings.acquisition.channels,
                vec![Channel::new(0), Channel::new(1), Channel::new(2)]
            );
            assert_eq!(settings.acquisition.interval, Duration::from_millis(250));
            assert_eq!(settings.acquisition.numeric_policy, NumericPolicy::Raw);
            assert_eq!(settings.acquisition.max_samples, Some(10));
            assert_eq!(settings.channel_options.thermocouple, ThermocoupleType::J);
            assert_eq!(settings.channel_options.scale, TemperatureScale::Celsius);
            assert_eq!(settings.channel_options.data_rate_hz, 60);
            assert_eq!(settings.device.flash_count, 2);
            assert_eq!(settings.device.product_filter, "USB-2408");
            assert_eq!(settings.storage.output_path, PathBuf::from("runs/bench.csv"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let settings = Settings::load_from("absent.toml").map_err(|e| e.to_string())?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn test_config_validation() {
        let mut settings = Settings::default();
        settings.application.log_level = "verbose".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.acquisition.channels = vec![Channel::new(1), Channel::new(1)];
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.acquisition.channels.clear();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.acquisition.interval = Duration::ZERO;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.acquisition.max_samples = Some(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
