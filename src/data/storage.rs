//! Storage writers for finalized series.
use crate::{
    data::series::{Header, Series},
    error::{DaqError, DaqResult},
};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Durable output for a frozen series.
///
/// Implementations report every failure to the caller; a failed write may leave
/// the destination with partial content.
pub trait Sink {
    /// Write `header` followed by every row of `series` to `destination`.
    fn write(&mut self, header: &Header, series: &Series, destination: &Path) -> DaqResult<()>;
}

/// A writer for CSV files.
///
/// The first record holds the channel labels, each following record one row's
/// samples in channel order. Fields are comma separated, records end in `\n`.
#[derive(Debug, Default, Clone)]
pub struct CsvSink {
    written: usize,
}

impl CsvSink {
    /// Create a CSV sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `header` and `series` into any writer.
    pub fn write_to<W: Write>(&self, header: &Header, series: &Series, out: W) -> DaqResult<()> {
        if header != series.header() {
            return Err(DaqError::Configuration(format!(
                "header {:?} does not match series channels {:?}",
                header.labels(),
                series.header().labels()
            )));
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        writer.write_record(header.labels())?;
        for row in series.rows() {
            writer.write_record(row.samples().iter().map(ToString::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of successful `write` calls made through this sink.
    pub fn writes(&self) -> usize {
        self.written
    }
}

impl Sink for CsvSink {
    fn write(&mut self, header: &Header, series: &Series, destination: &Path) -> DaqResult<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(destination)?;
        self.write_to(header, series, file)?;
        self.written += 1;
        tracing::info!(
            path = %destination.display(),
            rows = series.len(),
            "CSV written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::series::{Channel, Row, Sample};

    fn series(rows: &[&[i64]]) -> Series {
        let header = Header::from_channels(&[Channel::new(0), Channel::new(1)]);
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, values)| {
                Row::new(
                    i as u64,
                    values.iter().copied().map(Sample::Integer).collect(),
                )
            })
            .collect();
        Series::new(header, rows)
    }

    #[test]
    fn test_write_to_buffer() {
        let s = series(&[&[72, 73], &[-1, 0]]);
        let mut out = Vec::new();
        CsvSink::new().write_to(s.header(), &s, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "channel 0,channel 1\n72,73\n-1,0\n"
        );
    }

    #[test]
    fn test_empty_series_writes_header_only() {
        let s = series(&[]);
        let mut out = Vec::new();
        CsvSink::new().write_to(s.header(), &s, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "channel 0,channel 1\n");
    }

    #[test]
    fn test_header_mismatch_is_rejected() {
        let s = series(&[&[1, 2]]);
        let header = Header::from_channels(&[Channel::new(0)]);
        let err = CsvSink::new().write_to(&header, &s, Vec::new()).unwrap_err();
        assert!(matches!(err, DaqError::Configuration(_)));
    }

    #[test]
    fn test_relabelled_header_is_rejected() {
        let s = series(&[&[1, 2]]);
        let header = Header::from_channels(&[Channel::new(0), Channel::new(2)]);
        let mut out = Vec::new();
        let err = CsvSink::new().write_to(&header, &s, &mut out).unwrap_err();
        assert!(matches!(err, DaqError::Configuration(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_failure_is_io_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "device full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let s = series(&[&[1, 2]]);
        let err = CsvSink::new().write_to(s.header(), &s, Broken).unwrap_err();
        assert!(matches!(err, DaqError::Io(_)));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("temps.csv");
        let s = series(&[&[72, 73]]);

        let mut sink = CsvSink::new();
        sink.write(s.header(), &s, &path).unwrap();
        assert_eq!(sink.writes(), 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "channel 0,channel 1\n72,73\n"
        );
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let s = series(&[]);
        // A directory cannot be opened as a file
        let err = CsvSink::new().write(s.header(), &s, dir.path()).unwrap_err();
        assert!(matches!(err, DaqError::Io(_)));
    }
}
