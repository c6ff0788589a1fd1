//! Device session management.
//!
//! Wraps the lifecycle around an acquisition run: find the device by product
//! name, connect, flash its indicator so the operator can identify it, apply
//! channel options, and on the way out disconnect and release the handle.

use tracing::{error, info, warn};

use crate::data::series::Channel;
use crate::error::{DaqError, DaqResult};
use crate::hardware::{
    ChannelOptions, ChannelReader, DeviceDescriptor, DeviceInventory, DeviceLifecycle,
};

/// An open connection to one discovered device.
pub struct DeviceSession<'a, D> {
    device: &'a D,
    descriptor: DeviceDescriptor,
    closed: bool,
}

impl<'a, D> DeviceSession<'a, D>
where
    D: DeviceLifecycle + ChannelReader,
{
    /// Discover devices, pick the first whose product name contains
    /// `product_filter`, connect to it and flash its indicator `flash_count`
    /// times (0 skips flashing).
    pub async fn open<I: DeviceInventory + ?Sized>(
        inventory: &I,
        device: &'a D,
        product_filter: &str,
        flash_count: u32,
    ) -> DaqResult<Self> {
        let devices = inventory
            .discover()
            .await
            .map_err(|e| DaqError::Device(format!("discovery failed: {e}")))?;
        if devices.is_empty() {
            return Err(DaqError::Device("no DAQ devices found".to_string()));
        }
        info!(count = devices.len(), "Found DAQ device(s)");

        let descriptor = select_device(&devices, product_filter)
            .cloned()
            .ok_or_else(|| DaqError::Device(format!("no {product_filter} found")))?;
        info!(
            product = %descriptor.product_name,
            id = %descriptor.unique_id,
            "Connecting to device"
        );

        device
            .connect()
            .await
            .map_err(|e| DaqError::Device(format!("connect failed: {e}")))?;
        let session = Self {
            device,
            descriptor,
            closed: false,
        };

        if flash_count > 0 {
            if let Err(e) = device.flash_indicator(flash_count).await {
                warn!(error = %e, "Indicator flash failed");
            }
        }
        Ok(session)
    }

    /// Descriptor of the connected device.
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Apply `options` to every channel in order.
    pub async fn configure_channels(
        &self,
        channels: &[Channel],
        options: &ChannelOptions,
    ) -> DaqResult<()> {
        for &channel in channels {
            self.device
                .configure_channel(channel, options)
                .await
                .map_err(|e| {
                    DaqError::Configuration(format!("failed to configure {channel}: {e}"))
                })?;
        }
        info!(
            channels = channels.len(),
            thermocouple = ?options.thermocouple,
            scale = %options.scale,
            input_mode = ?options.input_mode,
            "Channels configured"
        );
        Ok(())
    }

    /// Disconnect if still connected, then release the device. Idempotent.
    pub async fn close(&mut self) -> DaqResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut failure = None;
        if self.device.is_connected() {
            if let Err(e) = self.device.disconnect().await {
                warn!(error = %e, "Disconnect failed");
                failure = Some(format!("disconnect failed: {e}"));
            }
        }
        if let Err(e) = self.device.release().await {
            warn!(error = %e, "Release failed");
            failure = Some(format!("release failed: {e}"));
        }
        info!(product = %self.descriptor.product_name, "Device released");

        match failure {
            Some(msg) => Err(DaqError::Device(msg)),
            None => Ok(()),
        }
    }

    /// Close the session after a run and report the run's own result first.
    ///
    /// A close failure is returned only when `outcome` succeeded; otherwise it
    /// is logged and `outcome`'s error is kept.
    pub async fn close_after<T, E>(&mut self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<DaqError> + std::fmt::Display,
    {
        let closed = self.close().await;
        match (outcome, closed) {
            (Err(e), Err(close_err)) => {
                error!(
                    error = %e,
                    close_error = %close_err,
                    "Device release failed after run error"
                );
                Err(e)
            }
            (outcome, closed) => {
                closed?;
                outcome
            }
        }
    }
}

impl<D> Drop for DeviceSession<'_, D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                product = %self.descriptor.product_name,
                "Device session dropped without close()"
            );
        }
    }
}

/// First descriptor whose product name contains `product_filter`.
pub fn select_device<'d>(
    devices: &'d [DeviceDescriptor],
    product_filter: &str,
) -> Option<&'d DeviceDescriptor> {
    devices
        .iter()
        .find(|d| d.product_name.contains(product_filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockThermocoupleDaq;
    use async_trait::async_trait;

    /// Device whose handle cannot be released.
    struct StuckDevice;

    #[async_trait]
    impl ChannelReader for StuckDevice {
        async fn read(&self, _channel: Channel, _options: &ChannelOptions) -> anyhow::Result<f64> {
            Ok(0.0)
        }
    }

    #[async_trait]
    impl DeviceLifecycle for StuckDevice {
        async fn connect(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            false
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn release(&self) -> anyhow::Result<()> {
            anyhow::bail!("handle busy")
        }
    }

    fn descriptor(name: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            product_name: name.to_string(),
            unique_id: "1".to_string(),
        }
    }

    #[test]
    fn test_select_device_by_substring() {
        let devices = [descriptor("USB-1608"), descriptor("USB-2408-2AO")];
        assert_eq!(
            select_device(&devices, "USB-2408").map(|d| d.product_name.as_str()),
            Some("USB-2408-2AO")
        );
        assert!(select_device(&devices, "USB-TC").is_none());
    }

    #[tokio::test]
    async fn test_open_configure_close() {
        let daq = MockThermocoupleDaq::new();
        let mut session = DeviceSession::open(&daq, &daq, "USB-2408", 5)
            .await
            .unwrap();
        assert!(daq.is_connected());
        assert_eq!(daq.flash_count(), 5);
        assert_eq!(session.descriptor().product_name, "USB-2408");

        let channels = [Channel::new(0), Channel::new(1)];
        session
            .configure_channels(&channels, &ChannelOptions::default())
            .await
            .unwrap();
        assert!(daq.channel_options(Channel::new(1)).is_some());

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(!daq.is_connected());
        assert!(daq.is_released());
    }

    #[tokio::test]
    async fn test_open_rejects_unmatched_product() {
        let daq = MockThermocoupleDaq::new();
        let err = DeviceSession::open(&daq, &daq, "USB-TEMP", 0)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DaqError::Device(_)));
        assert!(!daq.is_connected());
    }

    #[tokio::test]
    async fn test_open_with_no_devices() {
        let daq = MockThermocoupleDaq::new();
        daq.release().await.unwrap();
        let err = DeviceSession::open(&daq, &daq, "USB-2408", 0)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("no DAQ devices found"));
    }

    #[tokio::test]
    async fn test_close_after_keeps_run_error() {
        let inventory = MockThermocoupleDaq::new();
        let mut session = DeviceSession::open(&inventory, &StuckDevice, "USB-2408", 0)
            .await
            .unwrap();
        let outcome: DaqResult<()> = Err(DaqError::acquisition(
            Channel::new(3),
            anyhow::anyhow!("read timeout"),
        ));
        let err = session.close_after(outcome).await.unwrap_err();
        assert_eq!(err.channel(), Some(Channel::new(3)));
    }

    #[tokio::test]
    async fn test_close_after_reports_close_failure_on_success() {
        let inventory = MockThermocoupleDaq::new();
        let mut session = DeviceSession::open(&inventory, &StuckDevice, "USB-2408", 0)
            .await
            .unwrap();
        let err = session.close_after(Ok::<_, DaqError>(5)).await.unwrap_err();
        assert!(err.to_string().contains("release failed"));
    }

    #[tokio::test]
    async fn test_close_after_passes_outcome_through() {
        let daq = MockThermocoupleDaq::new();
        let mut session = DeviceSession::open(&daq, &daq, "USB-2408", 0)
            .await
            .unwrap();
        let value = session.close_after(Ok::<_, DaqError>(5)).await.unwrap();
        assert_eq!(value, 5);
        assert!(daq.is_released());
    }
}
