//! Atomic Hardware Capabilities
//!
//! Fine-grained traits a thermocouple DAQ adapter implements. The acquisition
//! core only needs [`ChannelReader`]; [`DeviceLifecycle`] and [`DeviceInventory`]
//! are driven by the surrounding application (see [`crate::session`]).
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! Vendor SDK handles are generally not safe to call from several threads at
//! once. Callers in this crate hold a single owner per device and never issue
//! overlapping calls.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Usb2408 { /* SDK handle */ }
//!
//! #[async_trait]
//! impl ChannelReader for Usb2408 {
//!     async fn read(&self, channel: Channel, options: &ChannelOptions) -> Result<f64> {
//!         self.sdk.t_in(channel.id(), options.scale)
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::data::series::Channel;
use crate::hardware::ChannelOptions;

/// Capability: Per-Channel Scalar Readout
///
/// Devices that return one temperature (or other scalar) per input channel.
///
/// # Contract
/// - `read()` performs one conversion on `channel` and returns its value in the
///   scale named by `options`
/// - `configure_channel()` applies `options` to the channel ahead of reads
/// - Errors carry the device's own cause; the sampler attaches the channel
#[async_trait]
pub trait ChannelReader: Send + Sync {
    /// Read one value from `channel`
    ///
    /// # Returns
    /// - Ok(value) on successful conversion
    /// - Err on hardware error, open thermocouple or timeout
    async fn read(&self, channel: Channel, options: &ChannelOptions) -> Result<f64>;

    /// Apply channel type, thermocouple type, data rate and open-detect mode
    ///
    /// # Default Implementation
    /// Accepts any options without touching the device.
    async fn configure_channel(&self, _channel: Channel, _options: &ChannelOptions) -> Result<()> {
        Ok(())
    }
}

/// Capability: Connection Lifecycle
///
/// # Contract
/// - `connect()` establishes the session; reads are only valid afterwards
/// - `disconnect()` ends the session, `release()` frees the handle
/// - `release()` must be safe to call whether or not the device is connected
#[async_trait]
pub trait DeviceLifecycle: Send + Sync {
    /// Establish a connection to the device
    async fn connect(&self) -> Result<()>;

    /// Blink the device indicator `count` times to identify it
    ///
    /// # Default Implementation
    /// Returns an error indicating the device has no indicator.
    async fn flash_indicator(&self, _count: u32) -> Result<()> {
        anyhow::bail!("Indicator flashing not supported by this device")
    }

    /// Whether a connection is currently open
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn disconnect(&self) -> Result<()>;

    /// Release the device handle
    async fn release(&self) -> Result<()>;
}

/// Identity of a device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Product name, e.g. "USB-2408"
    pub product_name: String,
    /// Serial number or other unique identifier
    pub unique_id: String,
}

/// Capability: Device Discovery
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    /// List every device reachable on the interface
    async fn discover(&self) -> Result<Vec<DeviceDescriptor>>;
}

#[async_trait]
impl<T: ChannelReader + ?Sized> ChannelReader for &T {
    async fn read(&self, channel: Channel, options: &ChannelOptions) -> Result<f64> {
        (**self).read(channel, options).await
    }

    async fn configure_channel(&self, channel: Channel, options: &ChannelOptions) -> Result<()> {
        (**self).configure_channel(channel, options).await
    }
}

#[async_trait]
impl<T: ChannelReader + ?Sized> ChannelReader for std::sync::Arc<T> {
    async fn read(&self, channel: Channel, options: &ChannelOptions) -> Result<f64> {
        (**self).read(channel, options).await
    }

    async fn configure_channel(&self, channel: Channel, options: &ChannelOptions) -> Result<()> {
        (**self).configure_channel(channel, options).await
    }
}
