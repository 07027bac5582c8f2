//! Per-range counting into a flat `path_offset + date_id` array.

use crate::catalog::PathCatalog;
use crate::config::LineLayout;
use crate::date::DateIndex;
use crate::error::TallyError;
use crate::lines::{for_each_complete_line, split_fields};
use crate::ranges::ByteRange;
use crate::util::open_with_backoff;
use anyhow::{ensure, Result};
use indicatif::ProgressBar;
use memchr::memrchr;
use rayon::prelude::*;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Dense visit counters, `paths * dates` cells, indexed by `base_offset + date_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterArray {
    cells: Vec<u32>,
}

impl CounterArray {
    pub fn zeroed(len: usize) -> Self {
        Self { cells: vec![0; len] }
    }

    pub fn from_vec(cells: Vec<u32>) -> Self {
        Self { cells }
    }

    #[inline]
    pub fn increment(&mut self, idx: usize) {
        self.cells[idx] += 1;
    }

    /// Element-wise sum of `other` into `self`. Shapes must match.
    pub fn merge(&mut self, other: &CounterArray) -> Result<()> {
        ensure!(
            self.cells.len() == other.cells.len(),
            "counter arrays differ in length: {} vs {}",
            self.cells.len(),
            other.cells.len()
        );
        self.cells
            .par_iter_mut()
            .zip(other.cells.par_iter())
            .for_each(|(acc, v)| *acc += *v);
        Ok(())
    }

    #[inline]
    pub fn get(&self, idx: usize) -> u32 {
        self.cells[idx]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.cells
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of all cells.
    pub fn total(&self) -> u64 {
        self.cells.par_iter().map(|&c| c as u64).sum()
    }
}

/// Outcome of one worker's pass; `skipped` counts lines dropped by a lookup miss.
#[derive(Debug)]
pub struct Tally {
    pub counts: CounterArray,
    pub lines: u64,
    pub skipped: u64,
}

/// Count every complete line inside `range`, reading with a private file handle.
///
/// Reads are capped at the range end; after each block the cursor is backed up over the
/// trailing partial line so the next read starts on a line boundary. A block with no
/// newline at all (a line longer than the buffer) doubles the buffer and is re-read.
/// Bytes after the last newline of the range are not counted.
pub fn tally_range(
    input: &Path,
    range: ByteRange,
    catalog: &PathCatalog,
    dates: &DateIndex,
    layout: &LineLayout,
    read_buf_bytes: usize,
    pb: Option<&ProgressBar>,
) -> Result<Tally> {
    let mut tally = Tally {
        counts: CounterArray::zeroed(catalog.cells()),
        lines: 0,
        skipped: 0,
    };
    if range.is_empty() {
        return Ok(tally);
    }

    let mut file = open_with_backoff(input).map_err(|e| TallyError::io("open", input, e))?;
    file.seek(SeekFrom::Start(range.start)).map_err(|e| TallyError::io("seek", input, e))?;

    let mut block = vec![0u8; read_buf_bytes.max(1)];
    let mut pos = range.start;
    while pos < range.end {
        let want = block.len().min((range.end - pos) as usize);
        let n = fill(&mut file, &mut block[..want]).map_err(|e| TallyError::io("read", input, e))?;
        if n == 0 {
            break;
        }
        let Some(last_nl) = memrchr(b'\n', &block[..n]) else {
            if n < want || pos + n as u64 >= range.end {
                tracing::debug!(bytes = n, at = pos, "tally: ignoring unterminated final line");
                break;
            }
            let grown = block.len() * 2;
            block.resize(grown, 0);
            file.seek(SeekFrom::Start(pos)).map_err(|e| TallyError::io("seek", input, e))?;
            continue;
        };

        let consumed = last_nl + 1;
        for_each_complete_line(&block[..consumed], |line| {
            tally.lines += 1;
            let Some(fields) = split_fields(line, layout) else { return };
            match (catalog.offset_of(fields.path), dates.id_of(fields.date)) {
                (Some(base), Some(id)) => tally.counts.increment(base + id as usize),
                _ => tally.skipped += 1,
            }
        });

        let tail = n - consumed;
        if tail > 0 {
            file.seek(SeekFrom::Current(-(tail as i64)))
                .map_err(|e| TallyError::io("seek", input, e))?;
        }
        pos += consumed as u64;
        if let Some(pb) = pb {
            pb.inc(consumed as u64);
        }
    }
    Ok(tally)
}

/// Read until `buf` is full or EOF.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(k) => filled += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
