use crate::error::TallyError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Width of the `YYYY-MM-DD` prefix of the datetime field.
pub const DATE_LEN: usize = 10;

/// Fixed-width layout of one access-log line:
/// `<prefix><delim><path><delim><datetime>`.
/// Only the two fixed widths are needed; the path is whatever sits between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineLayout {
    /// Byte length of the URL prefix (e.g. `https://stitcher.io`).
    pub prefix_len: usize,
    /// Byte length of the trailing ISO-8601 datetime incl. offset (`2024-01-01T00:00:00+00:00`).
    pub datetime_len: usize,
}

impl Default for LineLayout {
    fn default() -> Self {
        Self { prefix_len: 19, datetime_len: 25 }
    }
}

impl LineLayout {
    pub fn new(prefix_len: usize, datetime_len: usize) -> Self {
        Self { prefix_len, datetime_len }
    }

    /// Shortest line that can still carry a (possibly empty) path and a datetime.
    #[inline]
    pub fn min_line_len(&self) -> usize {
        self.prefix_len + 1 + self.datetime_len
    }

    pub fn validate(&self) -> Result<(), TallyError> {
        if self.datetime_len < DATE_LEN {
            return Err(TallyError::Config(format!(
                "datetime_len must be at least {DATE_LEN} bytes, got {}",
                self.datetime_len
            )));
        }
        Ok(())
    }
}

/// Inclusive range of calendar years enumerated by the date index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarRange {
    pub first_year: i32,
    pub last_year: i32,
}

impl Default for CalendarRange {
    fn default() -> Self {
        Self { first_year: 2020, last_year: 2026 }
    }
}

impl CalendarRange {
    pub fn new(first_year: i32, last_year: i32) -> Self {
        Self { first_year, last_year }
    }

    pub fn validate(&self) -> Result<(), TallyError> {
        if self.first_year > self.last_year {
            return Err(TallyError::Config(format!(
                "calendar range is inverted: {} > {}",
                self.first_year, self.last_year
            )));
        }
        if !(0..=9999).contains(&self.first_year) || !(0..=9999).contains(&self.last_year) {
            return Err(TallyError::Config("calendar years must be within 0000..=9999".into()));
        }
        Ok(())
    }
}

/// How spawned workers hand their partial counter arrays back to the aggregator.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Transport {
    /// Move the owned array through the worker's join handle.
    #[default]
    InMemory,
    /// Pack each array as little-endian u32 into a file under `dir`; removed after unpacking.
    Spill { dir: PathBuf },
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct TallyOptions {
    pub layout: LineLayout,
    pub calendar: CalendarRange,
    pub workers: usize,
    pub transport: Transport,
    pub progress: bool,
    pub pretty: bool,

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,
}

impl Default for TallyOptions {
    fn default() -> Self {
        let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            layout: LineLayout::default(),
            calendar: CalendarRange::default(),
            workers: hw,
            transport: Transport::InMemory,
            progress: false,
            pretty: false,
            read_buffer_bytes: 2 * 1024 * 1024,
            write_buffer_bytes: 1024 * 1024,
        }
    }
}

impl TallyOptions {
    pub fn with_layout(mut self, layout: LineLayout) -> Self {
        self.layout = layout;
        self
    }
    pub fn with_calendar(mut self, calendar: CalendarRange) -> Self {
        self.calendar = calendar;
        self
    }
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
    pub fn with_spill_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.transport = Transport::Spill { dir: dir.as_ref().to_path_buf() };
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    // IO buffers tuning
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }

    pub fn validate(&self) -> Result<(), TallyError> {
        self.layout.validate()?;
        self.calendar.validate()?;
        Ok(())
    }
}
