//! Live views of an acquisition run.
//!
//! A display observes series snapshots and has no influence on correctness:
//! rendering failures are logged and swallowed.

use std::io::Write;

use crate::data::series::Series;

/// Consumer of series snapshots for visualization.
pub trait SeriesDisplay: Send {
    /// Show `snapshot`, whose columns are labelled by `labels`.
    fn render(&mut self, snapshot: &Series, labels: &[String]);
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl SeriesDisplay for NullDisplay {
    fn render(&mut self, _snapshot: &Series, _labels: &[String]) {}
}

/// Prints the newest row under its channel labels.
///
/// With cursor reset enabled, each render first moves the terminal cursor to
/// the top-left corner so the readout updates in place.
pub struct ConsoleDisplay<W> {
    out: W,
    reset_cursor: bool,
    unit: Option<&'static str>,
}

impl ConsoleDisplay<std::io::Stdout> {
    /// Print to standard output, refreshing in place.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout()).with_cursor_reset(true)
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    /// Print to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            reset_cursor: false,
            unit: None,
        }
    }

    /// Move the cursor home before each render.
    pub fn with_cursor_reset(mut self, enabled: bool) -> Self {
        self.reset_cursor = enabled;
        self
    }

    /// Append a unit suffix to the readout line.
    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_snapshot(&mut self, snapshot: &Series, labels: &[String]) -> std::io::Result<()> {
        if self.reset_cursor {
            self.out.write_all(b"\x1b[1;1H")?;
        }
        writeln!(self.out, "{}", labels.join(", "))?;
        if let Some(row) = snapshot.last() {
            let values: Vec<String> = row.samples().iter().map(ToString::to_string).collect();
            match self.unit {
                Some(unit) => writeln!(self.out, "{} [{}]", values.join(", "), unit)?,
                None => writeln!(self.out, "{}", values.join(", "))?,
            }
        }
        writeln!(self.out, "length of measures = {}", snapshot.len())?;
        self.out.flush()
    }
}

impl<W: Write + Send> SeriesDisplay for ConsoleDisplay<W> {
    fn render(&mut self, snapshot: &Series, labels: &[String]) {
        if let Err(e) = self.write_snapshot(snapshot, labels) {
            tracing::debug!(error = %e, "Console display write failed");
        }
    }
}

/// Emits each new row as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl SeriesDisplay for TracingDisplay {
    fn render(&mut self, snapshot: &Series, labels: &[String]) {
        if let Some(row) = snapshot.last() {
            for (label, sample) in labels.iter().zip(row.samples()) {
                tracing::info!(tick = row.tick(), channel = %label, value = %sample, "reading");
            }
        }
    }
}
