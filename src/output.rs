//! Result writer: nested `{ path: { date: visits } }` JSON, paths in first-seen order and
//! dates in chronological order, zero counts omitted.

use crate::catalog::PathCatalog;
use crate::date::DateIndex;
use crate::error::TallyError;
use crate::tally::CounterArray;
use crate::util::{create_with_backoff, remove_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Final, merged result of a run plus the label tables needed to read it.
#[derive(Clone, Debug)]
pub struct VisitReport {
    pub dates: DateIndex,
    pub catalog: PathCatalog,
    pub counts: CounterArray,
    pub input_bytes: u64,
}

impl VisitReport {
    /// Visits of `path` on `date` (`YYYY-MM-DD`); 0 for unknown paths or dates.
    pub fn visits(&self, path: &str, date: &str) -> u32 {
        match (self.catalog.offset_of(path.as_bytes()), self.dates.id_of(date.as_bytes())) {
            (Some(base), Some(id)) => self.counts.get(base + id as usize),
            _ => 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    /// Serialize the report into `w`. Does not flush.
    pub fn write_json<W: Write>(&self, w: W, pretty: bool) -> Result<()> {
        let res = if pretty {
            serde_json::to_writer_pretty(w, &ReportView(self))
        } else {
            serde_json::to_writer(w, &ReportView(self))
        };
        res.map_err(|e| {
            if e.is_io() {
                TallyError::io("write", "<report writer>", e.into())
            } else {
                TallyError::Serialization(e.to_string())
            }
        })?;
        Ok(())
    }

    pub fn to_json_string(&self, pretty: bool) -> Result<String> {
        let mut buf = Vec::new();
        self.write_json(&mut buf, pretty)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Write to `<output>.inprogress`, then promote over `output` once fully flushed.
    pub fn write_to_file(&self, output: &Path, pretty: bool, write_buf_bytes: usize) -> Result<()> {
        let tmp = inprogress_path(output);
        let res = (|| -> Result<()> {
            let file = create_with_backoff(&tmp).map_err(|e| TallyError::io("write", &tmp, e))?;
            let mut w = BufWriter::with_capacity(write_buf_bytes, file);
            self.write_json(&mut w, pretty)?;
            w.write_all(b"\n").map_err(|e| TallyError::io("write", &tmp, e))?;
            w.flush().map_err(|e| TallyError::io("write", &tmp, e))?;
            Ok(())
        })();
        if let Err(e) = res {
            if let Err(rm) = remove_with_backoff(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %rm, "failed to remove partial report");
            }
            return Err(e).with_context(|| format!("writing report {}", output.display()));
        }
        replace_file_atomic_backoff(&tmp, output)?;
        tracing::info!(path = %output.display(), paths = self.catalog.len(), "report written");
        Ok(())
    }
}

fn inprogress_path(output: &Path) -> PathBuf {
    let mut s = OsString::from(output.as_os_str());
    s.push(".inprogress");
    PathBuf::from(s)
}

struct ReportView<'a>(&'a VisitReport);

impl Serialize for ReportView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let VisitReport { dates, catalog, counts, .. } = self.0;
        let date_count = dates.len();
        let mut map = serializer.serialize_map(Some(catalog.len()))?;
        for (idx, label) in catalog.labels().iter().enumerate() {
            let path = std::str::from_utf8(label)
                .map_err(|e| S::Error::custom(format!("path #{idx} is not valid UTF-8: {e}")))?;
            let base = idx * date_count;
            let row = &counts.as_slice()[base..base + date_count];
            map.serialize_entry(path, &DateCounts { row, dates })?;
        }
        map.end()
    }
}

struct DateCounts<'a> {
    row: &'a [u32],
    dates: &'a DateIndex,
}

impl Serialize for DateCounts<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (id, &visits) in self.row.iter().enumerate() {
            if visits != 0 {
                map.serialize_entry(self.dates.label(id), &visits)?;
            }
        }
        map.end()
    }
}
