//! Series data model.
//!
//! A run produces one [`Row`] per tick. Each row holds exactly one [`Sample`] per
//! configured [`Channel`], in channel-list order. Rows accumulate into an
//! append-only [`Series`] that carries the [`Header`] derived from the channel
//! list.

use crate::error::{DaqError, DaqResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of one physical input on the acquisition device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(u32);

impl Channel {
    /// Wraps a raw channel number.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw channel number.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Header label used for this channel in CSV output.
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl From<u32> for Channel {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {}", self.0)
    }
}

/// How raw readings are stored.
///
/// `Truncate` is lossy: the fractional part of every reading is dropped
/// (rounded toward zero) before storage. The policy is fixed per sampler and
/// applies to every sample of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPolicy {
    /// Truncate toward zero to integer precision.
    #[default]
    Truncate,
    /// Keep the reading exactly as returned by the device.
    Raw,
}

impl NumericPolicy {
    /// Converts a raw reading from `channel` into a stored sample.
    ///
    /// Non-finite readings and readings outside the `i64` range have no
    /// integer representation and fail under `Truncate`.
    pub fn apply(self, channel: Channel, raw: f64) -> DaqResult<Sample> {
        match self {
            NumericPolicy::Raw => Ok(Sample::Float(raw)),
            NumericPolicy::Truncate if !raw.is_finite() => Err(DaqError::acquisition(
                channel,
                anyhow::anyhow!("non-finite reading {raw} cannot be truncated"),
            )),
            NumericPolicy::Truncate => {
                let truncated = raw.trunc();
                // i64::MAX as f64 rounds up to 2^63, which is itself out of range
                if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                    Ok(Sample::Integer(truncated as i64))
                } else {
                    Err(DaqError::acquisition(
                        channel,
                        anyhow::anyhow!("reading {raw} is outside the integer range"),
                    ))
                }
            }
        }
    }
}

/// One stored reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Reading truncated toward zero.
    Integer(i64),
    /// Reading as returned by the device.
    Float(f64),
}

impl Sample {
    /// Numeric value of the sample.
    pub fn as_f64(self) -> f64 {
        match self {
            Sample::Integer(v) => v as f64,
            Sample::Float(v) => v,
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Integer(v) => write!(f, "{v}"),
            Sample::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One time-aligned reading per configured channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    tick: u64,
    samples: Vec<Sample>,
}

impl Row {
    pub(crate) fn new(tick: u64, samples: Vec<Sample>) -> Self {
        Self { tick, samples }
    }

    /// Tick index this row was acquired on (0-based).
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Samples in channel-list order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples, always equal to the number of configured channels.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True only for a row built from an empty channel list, which the
    /// sampler never produces.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Channel labels written as the first CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    labels: Vec<String>,
}

impl Header {
    /// Derives the header from a channel list.
    pub fn from_channels(channels: &[Channel]) -> Self {
        Self {
            labels: channels.iter().map(|c| c.label()).collect(),
        }
    }

    /// Labels in channel order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the header has no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Ordered history of rows for a run.
///
/// A `Series` value is an immutable snapshot: it exposes no mutators. The live
/// series is owned by the [`Sampler`](crate::data::sampler::Sampler).
/// Cloning a snapshot shares its rows instead of copying them.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    header: Header,
    rows: Arc<Vec<Row>>,
}

impl Series {
    pub(crate) fn new(header: Header, rows: Vec<Row>) -> Self {
        Self::from_shared(header, Arc::new(rows))
    }

    pub(crate) fn from_shared(header: Header, rows: Arc<Vec<Row>>) -> Self {
        Self { header, rows }
    }

    /// Header derived from the channel list.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Rows in tick order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no tick has completed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recently appended row.
    pub fn last(&self) -> Option<&Row> {
        self.rows.last()
    }

    /// Values of one column (by channel position) across all rows.
    pub fn column(&self, index: usize) -> impl Iterator<Item = Sample> + '_ {
        self.rows
            .iter()
            .filter_map(move |row| row.samples().get(index).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_label() {
        assert_eq!(Channel::new(5).label(), "channel 5");
    }

    #[test]
    fn test_truncate_is_toward_zero() {
        let ch = Channel::new(0);
        assert_eq!(
            NumericPolicy::Truncate.apply(ch, 72.9).unwrap(),
            Sample::Integer(72)
        );
        assert_eq!(
            NumericPolicy::Truncate.apply(ch, -3.7).unwrap(),
            Sample::Integer(-3)
        );
    }

    #[test]
    fn test_truncate_rejects_non_finite() {
        let err = NumericPolicy::Truncate
            .apply(Channel::new(2), f64::NAN)
            .unwrap_err();
        assert_eq!(err.channel(), Some(Channel::new(2)));
    }

    #[test]
    fn test_truncate_rejects_out_of_range() {
        for raw in [1e20, -1e20, 9.3e18] {
            let err = NumericPolicy::Truncate
                .apply(Channel::new(4), raw)
                .unwrap_err();
            assert_eq!(err.channel(), Some(Channel::new(4)));
        }
        assert_eq!(
            NumericPolicy::Truncate.apply(Channel::new(4), -9.2e18).unwrap(),
            Sample::Integer(-9_200_000_000_000_000_000)
        );
    }

    #[test]
    fn test_raw_keeps_fraction() {
        let sample = NumericPolicy::Raw.apply(Channel::new(0), 72.25).unwrap();
        assert_eq!(sample, Sample::Float(72.25));
        assert_eq!(sample.to_string(), "72.25");
    }

    #[test]
    fn test_header_matches_channels() {
        let channels = [Channel::new(0), Channel::new(3), Channel::new(1)];
        let header = Header::from_channels(&channels);
        assert_eq!(header.len(), channels.len());
        assert_eq!(header.labels(), ["channel 0", "channel 3", "channel 1"]);
    }

    #[test]
    fn test_series_column() {
        let header = Header::from_channels(&[Channel::new(0), Channel::new(1)]);
        let rows = vec![
            Row::new(0, vec![Sample::Integer(1), Sample::Integer(2)]),
            Row::new(1, vec![Sample::Integer(3), Sample::Integer(4)]),
        ];
        let series = Series::new(header, rows);
        let second: Vec<f64> = series.column(1).map(Sample::as_f64).collect();
        assert_eq!(second, vec![2.0, 4.0]);
        assert_eq!(series.last().map(Row::tick), Some(1));
    }
}
