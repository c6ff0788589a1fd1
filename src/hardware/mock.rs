//! Mock Hardware Implementations
//!
//! Provides a simulated thermocouple DAQ for running the acquisition loop without
//! physical hardware. All delays use `tokio::time::sleep`, never
//! `std::thread::sleep`.
//!
//! # Behaviour
//!
//! - Each channel sits at a base temperature (default 22.2 °C, about 72 °F) plus
//!   uniform noise, reported in the scale requested by `ChannelOptions`
//! - Scripted readings, when queued for a channel, are returned verbatim first
//! - A channel can be told to fail after a number of successful reads
//! - An optional per-read latency simulates slow conversions

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::{sleep, Duration};

use crate::data::series::Channel;
use crate::hardware::capabilities::{
    ChannelReader, DeviceDescriptor, DeviceInventory, DeviceLifecycle,
};
use crate::hardware::ChannelOptions;

const DEFAULT_BASE_CELSIUS: f64 = 22.2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated USB thermocouple DAQ.
///
/// # Example
///
/// ```rust,ignore
/// let daq = MockThermocoupleDaq::new()
///     .with_readings(Channel::new(0), [72.0, 73.0])
///     .with_failure_after(Channel::new(1), 5);
/// daq.connect().await?;
/// let value = daq.read(Channel::new(0), &ChannelOptions::default()).await?;
/// ```
pub struct MockThermocoupleDaq {
    descriptor: DeviceDescriptor,
    base_celsius: HashMap<Channel, f64>,
    noise_celsius: f64,
    read_latency: Duration,
    scripted: Mutex<HashMap<Channel, VecDeque<f64>>>,
    fail_after: HashMap<Channel, u64>,
    reads_per_channel: Mutex<HashMap<Channel, u64>>,
    configured: Mutex<HashMap<Channel, ChannelOptions>>,
    total_reads: AtomicU64,
    flashes: AtomicU32,
    connected: AtomicBool,
    released: AtomicBool,
}

impl MockThermocoupleDaq {
    /// Create a simulated USB-2408 with ±0.5 °C noise and no latency
    pub fn new() -> Self {
        Self::with_descriptor(DeviceDescriptor {
            product_name: "USB-2408".to_string(),
            unique_id: "SIM-0001".to_string(),
        })
    }

    /// Create a simulated device reporting `descriptor` during discovery
    pub fn with_descriptor(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            base_celsius: HashMap::new(),
            noise_celsius: 0.5,
            read_latency: Duration::ZERO,
            scripted: Mutex::new(HashMap::new()),
            fail_after: HashMap::new(),
            reads_per_channel: Mutex::new(HashMap::new()),
            configured: Mutex::new(HashMap::new()),
            total_reads: AtomicU64::new(0),
            flashes: AtomicU32::new(0),
            connected: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    /// Set the resting temperature of `channel` in °C
    pub fn with_base_temperature(mut self, channel: Channel, celsius: f64) -> Self {
        self.base_celsius.insert(channel, celsius);
        self
    }

    /// Set the peak noise amplitude in °C (0 disables noise)
    pub fn with_noise(mut self, celsius: f64) -> Self {
        self.noise_celsius = celsius.abs();
        self
    }

    /// Delay every read by `latency`
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Queue readings returned verbatim (no scale conversion) by `channel`
    pub fn with_readings(self, channel: Channel, readings: impl IntoIterator<Item = f64>) -> Self {
        lock(&self.scripted)
            .entry(channel)
            .or_default()
            .extend(readings);
        self
    }

    /// Make `channel` fail every read after `successful_reads` good ones
    pub fn with_failure_after(mut self, channel: Channel, successful_reads: u64) -> Self {
        self.fail_after.insert(channel, successful_reads);
        self
    }

    /// Total reads served across all channels (including failed ones)
    pub fn read_count(&self) -> u64 {
        self.total_reads.load(Ordering::SeqCst)
    }

    /// Number of indicator flashes requested so far
    pub fn flash_count(&self) -> u32 {
        self.flashes.load(Ordering::SeqCst)
    }

    /// Whether `release()` has been called
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Options last applied to `channel`, if any
    pub fn channel_options(&self, channel: Channel) -> Option<ChannelOptions> {
        lock(&self.configured).get(&channel).cloned()
    }

    fn simulated_reading(&self, channel: Channel, options: &ChannelOptions) -> f64 {
        let base = self
            .base_celsius
            .get(&channel)
            .copied()
            .unwrap_or(DEFAULT_BASE_CELSIUS);
        let noise = if self.noise_celsius > 0.0 {
            rand::thread_rng().gen_range(-self.noise_celsius..self.noise_celsius)
        } else {
            0.0
        };
        options.scale.from_celsius(base + noise)
    }

    fn next_reading(&self, channel: Channel, options: &ChannelOptions) -> Result<f64> {
        if self.released.load(Ordering::SeqCst) {
            return Err(anyhow!("MockThermocoupleDaq: device handle released"));
        }

        let served = {
            let mut reads = lock(&self.reads_per_channel);
            let count = reads.entry(channel).or_insert(0);
            let served = *count;
            *count += 1;
            served
        };
        self.total_reads.fetch_add(1, Ordering::SeqCst);

        if let Some(&limit) = self.fail_after.get(&channel) {
            if served >= limit {
                return Err(anyhow!(
                    "MockThermocoupleDaq: open thermocouple detected on {}",
                    channel
                ));
            }
        }

        let scripted = lock(&self.scripted)
            .get_mut(&channel)
            .and_then(VecDeque::pop_front);
        Ok(scripted.unwrap_or_else(|| self.simulated_reading(channel, options)))
    }
}

impl Default for MockThermocoupleDaq {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelReader for MockThermocoupleDaq {
    async fn read(&self, channel: Channel, options: &ChannelOptions) -> Result<f64> {
        if !self.read_latency.is_zero() {
            sleep(self.read_latency).await;
        }
        let value = self.next_reading(channel, options)?;
        tracing::trace!(%channel, value, "MockThermocoupleDaq: read");
        Ok(value)
    }

    async fn configure_channel(&self, channel: Channel, options: &ChannelOptions) -> Result<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(anyhow!("MockThermocoupleDaq: device handle released"));
        }
        lock(&self.configured).insert(channel, options.clone());
        tracing::debug!(
            %channel,
            thermocouple = ?options.thermocouple,
            data_rate_hz = options.data_rate_hz,
            open_detect = options.open_detect,
            "MockThermocoupleDaq: channel configured"
        );
        Ok(())
    }
}

#[async_trait]
impl DeviceLifecycle for MockThermocoupleDaq {
    async fn connect(&self) -> Result<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(anyhow!("MockThermocoupleDaq: cannot connect a released device"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn flash_indicator(&self, count: u32) -> Result<()> {
        if !self.is_connected() {
            anyhow::bail!("MockThermocoupleDaq: not connected");
        }
        self.flashes.fetch_add(count, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DeviceInventory for MockThermocoupleDaq {
    async fn discover(&self) -> Result<Vec<DeviceDescriptor>> {
        if self.released.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(vec![self.descriptor.clone()])
    }
}
