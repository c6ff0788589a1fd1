//! Fixed-channel sampler owning the run's append-only series.
//!
//! The [`Sampler`] is the single writer of the series. Each [`Sampler::tick`]
//! reads every configured channel once, in order, and appends one [`Row`]. Rows
//! are only pushed after every read has returned, so an abandoned or failed
//! tick never leaves a partial row behind.
//!
//! Readers (a display running on another task, for example) obtain a
//! [`SeriesReader`] and take snapshots under a shared read lock. Rows live in a
//! copy-on-write buffer, so a snapshot shares it until the next append.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, instrument, warn};

use crate::data::series::{Channel, Header, NumericPolicy, Row, Series};
use crate::error::{DaqError, DaqResult};
use crate::hardware::{ChannelOptions, ChannelReader};

// Copy-on-write: snapshots share the row buffer until the next append.
type RowBuffer = Arc<Vec<Row>>;
type SharedRows = Arc<RwLock<RowBuffer>>;

fn read_rows(rows: &RwLock<RowBuffer>) -> RwLockReadGuard<'_, RowBuffer> {
    rows.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_rows(rows: &RwLock<RowBuffer>) -> RwLockWriteGuard<'_, RowBuffer> {
    rows.write().unwrap_or_else(PoisonError::into_inner)
}

/// Configured channel list and the rows acquired for it.
struct Configured {
    channels: Vec<Channel>,
    header: Header,
    rows: SharedRows,
}

enum SamplerState {
    Unconfigured,
    Running(Configured),
    Closed(Configured),
}

/// Drives per-channel acquisition and owns the growing [`Series`].
pub struct Sampler<R> {
    reader: R,
    options: ChannelOptions,
    policy: NumericPolicy,
    state: SamplerState,
}

impl<R: ChannelReader> Sampler<R> {
    /// Create an unconfigured sampler reading through `reader`.
    pub fn new(reader: R, options: ChannelOptions) -> Self {
        Self {
            reader,
            options,
            policy: NumericPolicy::default(),
            state: SamplerState::Unconfigured,
        }
    }

    /// Select how raw readings are stored. Applies to every sample of the run.
    pub fn with_numeric_policy(mut self, policy: NumericPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fix the channel list for the run and create the empty series.
    ///
    /// Fails with [`DaqError::Configuration`] if `channels` is empty, contains a
    /// duplicate, or the sampler was already configured.
    pub fn configure(&mut self, channels: impl IntoIterator<Item = Channel>) -> DaqResult<()> {
        if !matches!(self.state, SamplerState::Unconfigured) {
            return Err(DaqError::Configuration(
                "sampler channels are already configured".to_string(),
            ));
        }

        let channels: Vec<Channel> = channels.into_iter().collect();
        validate_channels(&channels)?;

        let header = Header::from_channels(&channels);
        info!(channels = ?header.labels(), policy = ?self.policy, "Sampler configured");
        self.state = SamplerState::Running(Configured {
            channels,
            header,
            rows: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        });
        Ok(())
    }

    /// Read every channel once and append the resulting row.
    ///
    /// On any read failure nothing is appended and the error names the failing
    /// channel.
    #[instrument(level = "debug", skip(self))]
    pub async fn tick(&mut self) -> DaqResult<Row> {
        let configured = match &self.state {
            SamplerState::Running(configured) => configured,
            SamplerState::Closed(_) => return Err(DaqError::Closed),
            SamplerState::Unconfigured => {
                return Err(DaqError::Configuration(
                    "configure() must be called before tick()".to_string(),
                ))
            }
        };

        let mut samples = Vec::with_capacity(configured.channels.len());
        for &channel in &configured.channels {
            let raw = self
                .reader
                .read(channel, &self.options)
                .await
                .map_err(|source| {
                    warn!(%channel, error = %source, "Channel read failed, discarding tick");
                    DaqError::acquisition(channel, source)
                })?;
            samples.push(self.policy.apply(channel, raw)?);
        }

        let mut rows = write_rows(&configured.rows);
        let row = Row::new(rows.len() as u64, samples);
        Arc::make_mut(&mut *rows).push(row.clone());
        debug!(tick = row.tick(), "Row appended");
        Ok(row)
    }

    /// Snapshot of every row appended so far.
    pub fn series(&self) -> DaqResult<Series> {
        let configured = self.configured()?;
        Ok(snapshot(&configured.header, &configured.rows))
    }

    /// Cloneable read-only handle onto the live series.
    pub fn reader_handle(&self) -> DaqResult<SeriesReader> {
        let configured = self.configured()?;
        Ok(SeriesReader {
            header: configured.header.clone(),
            rows: Arc::clone(&configured.rows),
        })
    }

    /// Freeze the series and hand it out. Later ticks fail with
    /// [`DaqError::Closed`].
    pub fn finalize(&mut self) -> DaqResult<Series> {
        let state = std::mem::replace(&mut self.state, SamplerState::Unconfigured);
        match state {
            SamplerState::Running(configured) => {
                let series = snapshot(&configured.header, &configured.rows);
                info!(rows = series.len(), "Sampler finalized");
                self.state = SamplerState::Closed(configured);
                Ok(series)
            }
            SamplerState::Closed(configured) => {
                self.state = SamplerState::Closed(configured);
                Err(DaqError::Closed)
            }
            SamplerState::Unconfigured => Err(DaqError::Configuration(
                "cannot finalize a sampler that was never configured".to_string(),
            )),
        }
    }

    /// Header derived from the channel list, once configured.
    pub fn header(&self) -> Option<&Header> {
        self.configured().ok().map(|c| &c.header)
    }

    /// Configured channels in order (empty before `configure`).
    pub fn channels(&self) -> &[Channel] {
        match self.configured() {
            Ok(c) => &c.channels,
            Err(_) => &[],
        }
    }

    /// Number of rows appended so far.
    pub fn len(&self) -> usize {
        self.configured().map_or(0, |c| read_rows(&c.rows).len())
    }

    /// Whether no row has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `finalize` has been called.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, SamplerState::Closed(_))
    }

    /// Per-channel options passed to every read.
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// The channel reader collaborator.
    pub fn channel_reader(&self) -> &R {
        &self.reader
    }

    fn configured(&self) -> DaqResult<&Configured> {
        match &self.state {
            SamplerState::Running(c) | SamplerState::Closed(c) => Ok(c),
            SamplerState::Unconfigured => Err(DaqError::Configuration(
                "sampler has no configured channels".to_string(),
            )),
        }
    }
}

/// Read-only view of a sampler's series, safe to move to another task.
///
/// A snapshot reflects rows appended before the call; callers must not assume
/// anything past the length they last observed.
#[derive(Clone)]
pub struct SeriesReader {
    header: Header,
    rows: SharedRows,
}

impl SeriesReader {
    /// Header of the observed series.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Rows appended so far.
    pub fn len(&self) -> usize {
        read_rows(&self.rows).len()
    }

    /// Whether no row has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the series as of now.
    pub fn snapshot(&self) -> Series {
        snapshot(&self.header, &self.rows)
    }

    /// Rows appended at or after tick `from`.
    pub fn rows_since(&self, from: usize) -> Vec<Row> {
        read_rows(&self.rows).iter().skip(from).cloned().collect()
    }
}

fn snapshot(header: &Header, rows: &RwLock<RowBuffer>) -> Series {
    Series::from_shared(header.clone(), Arc::clone(&read_rows(rows)))
}

/// Reject empty channel lists and duplicate identifiers.
pub fn validate_channels(channels: &[Channel]) -> DaqResult<()> {
    if channels.is_empty() {
        return Err(DaqError::Configuration(
            "channel list must not be empty".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(channels.len());
    for channel in channels {
        if !seen.insert(channel) {
            return Err(DaqError::Configuration(format!(
                "duplicate {channel} in channel list"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::Sample;
    use crate::hardware::MockThermocoupleDaq;

    fn channels(ids: &[u32]) -> Vec<Channel> {
        ids.iter().copied().map(Channel::new).collect()
    }

    fn sampler(daq: MockThermocoupleDaq) -> Sampler<MockThermocoupleDaq> {
        Sampler::new(daq, ChannelOptions::default())
    }

    #[test]
    fn test_configure_rejects_empty() {
        let mut s = sampler(MockThermocoupleDaq::new());
        let err = s.configure(Vec::new()).unwrap_err();
        assert!(matches!(err, DaqError::Configuration(_)));
        assert!(s.header().is_none());
        assert!(s.series().is_err());
    }

    #[test]
    fn test_configure_rejects_duplicates() {
        let mut s = sampler(MockThermocoupleDaq::new());
        let err = s.configure(channels(&[0, 1, 0])).unwrap_err();
        assert!(err.to_string().contains("duplicate channel 0"));
    }

    #[test]
    fn test_configure_only_once() {
        let mut s = sampler(MockThermocoupleDaq::new());
        s.configure(channels(&[0])).unwrap();
        assert!(matches!(
            s.configure(channels(&[1])),
            Err(DaqError::Configuration(_))
        ));
        assert_eq!(s.channels(), channels(&[0]).as_slice());
    }

    #[tokio::test]
    async fn test_tick_before_configure() {
        let mut s = sampler(MockThermocoupleDaq::new());
        assert!(matches!(s.tick().await, Err(DaqError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_tick_reads_in_channel_order() {
        let daq = MockThermocoupleDaq::new()
            .with_readings(Channel::new(5), [50.9])
            .with_readings(Channel::new(1), [10.2])
            .with_readings(Channel::new(3), [-30.7]);
        let mut s = sampler(daq);
        s.configure(channels(&[5, 1, 3])).unwrap();

        let row = s.tick().await.unwrap();
        assert_eq!(row.tick(), 0);
        assert_eq!(
            row.samples(),
            &[Sample::Integer(50), Sample::Integer(10), Sample::Integer(-30)]
        );
        assert_eq!(s.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_appends_nothing() {
        let daq = MockThermocoupleDaq::new().with_failure_after(Channel::new(1), 1);
        let mut s = sampler(daq);
        s.configure(channels(&[0, 1, 2])).unwrap();

        s.tick().await.unwrap();
        let err = s.tick().await.unwrap_err();
        assert_eq!(err.channel(), Some(Channel::new(1)));
        assert_eq!(s.len(), 1);
        // Channel 2 was never reached on the failed tick
        assert_eq!(s.channel_reader().read_count(), 5);
    }

    #[tokio::test]
    async fn test_non_finite_reading_fails_under_truncation() {
        let daq = MockThermocoupleDaq::new().with_readings(Channel::new(1), [f64::NAN]);
        let mut s = sampler(daq);
        s.configure(channels(&[0, 1])).unwrap();

        let err = s.tick().await.unwrap_err();
        assert_eq!(err.channel(), Some(Channel::new(1)));
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn test_raw_policy_keeps_values() {
        let daq = MockThermocoupleDaq::new().with_readings(Channel::new(0), [72.375]);
        let mut s = sampler(daq).with_numeric_policy(NumericPolicy::Raw);
        s.configure(channels(&[0])).unwrap();

        let row = s.tick().await.unwrap();
        assert_eq!(row.samples(), &[Sample::Float(72.375)]);
    }

    #[tokio::test]
    async fn test_series_snapshots_are_idempotent() {
        let mut s = sampler(MockThermocoupleDaq::new());
        s.configure(channels(&[0, 1])).unwrap();
        s.tick().await.unwrap();

        let a = s.series().unwrap();
        let b = s.series().unwrap();
        assert_eq!(a, b);

        s.tick().await.unwrap();
        assert_eq!(s.series().unwrap().len(), a.len() + 1);
    }

    #[tokio::test]
    async fn test_snapshots_share_rows_until_next_tick() {
        let mut s = sampler(MockThermocoupleDaq::new());
        s.configure(channels(&[0, 1])).unwrap();
        for _ in 0..3 {
            s.tick().await.unwrap();
        }

        let a = s.series().unwrap();
        let b = s.series().unwrap();
        assert!(std::ptr::eq(a.rows().as_ptr(), b.rows().as_ptr()));

        s.tick().await.unwrap();
        let c = s.series().unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(c.len(), 4);
        assert_eq!(&c.rows()[..3], a.rows());
    }

    #[tokio::test]
    async fn test_finalize_closes_sampler() {
        let mut s = sampler(MockThermocoupleDaq::new());
        s.configure(channels(&[0])).unwrap();
        s.tick().await.unwrap();

        let series = s.finalize().unwrap();
        assert_eq!(series.len(), 1);
        assert!(s.is_closed());
        assert!(matches!(s.tick().await, Err(DaqError::Closed)));
        assert!(matches!(s.finalize(), Err(DaqError::Closed)));
        // The frozen series is still readable
        assert_eq!(s.series().unwrap(), series);
    }

    #[tokio::test]
    async fn test_reader_handle_sees_appended_rows() {
        let mut s = sampler(MockThermocoupleDaq::new());
        s.configure(channels(&[0, 1])).unwrap();
        let reader = s.reader_handle().unwrap();
        assert!(reader.is_empty());

        s.tick().await.unwrap();
        s.tick().await.unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.rows_since(1).len(), 1);
        assert_eq!(reader.snapshot().header().len(), 2);
    }

    #[test]
    fn test_validate_channels() {
        assert!(validate_channels(&channels(&[0, 1, 2, 3, 5, 6])).is_ok());
        assert!(validate_channels(&[]).is_err());
    }
}
