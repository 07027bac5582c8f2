//! Handoff of a spawned worker's counter array to the aggregator.
//!
//! In-memory handoff moves the owned array. Spilled handoff packs it as little-endian u32
//! into a uniquely named file per worker and run, which the aggregator length-checks,
//! unpacks and deletes.

use crate::config::Transport;
use crate::error::TallyError;
use crate::tally::CounterArray;
use crate::util::{create_with_backoff, open_with_backoff, remove_with_backoff};
use anyhow::Result;
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const CELL_BYTES: usize = std::mem::size_of::<u32>();

/// What a spawned worker hands back once its tally is complete.
#[derive(Debug)]
pub enum Handoff {
    Owned(CounterArray),
    Spilled { path: PathBuf, cells: usize },
}

impl Transport {
    /// Called on the worker: package `counts` for transfer.
    pub fn send(&self, worker: usize, counts: CounterArray) -> Result<Handoff> {
        match self {
            Transport::InMemory => Ok(Handoff::Owned(counts)),
            Transport::Spill { dir } => {
                let cells = counts.len();
                let path = spill_with(dir, worker, |w| pack_cells(w, counts.as_slice()))?;
                Ok(Handoff::Spilled { path, cells })
            }
        }
    }

    /// Called on the aggregator: take ownership of a worker's array. Spill files are removed
    /// whether or not unpacking succeeds.
    pub fn receive(&self, worker: usize, handoff: Handoff, expected_cells: usize) -> Result<CounterArray> {
        let counts = match handoff {
            Handoff::Owned(counts) => counts,
            Handoff::Spilled { path, cells } => {
                let unpacked = read_packed(&path, cells);
                remove_with_backoff(&path)?;
                unpacked.map_err(|e| TallyError::Worker { worker, reason: format!("{e:#}") })?
            }
        };
        if counts.len() != expected_cells {
            return Err(TallyError::Worker {
                worker,
                reason: format!("result has {} cells, expected {}", counts.len(), expected_cells),
            }
            .into());
        }
        Ok(counts)
    }

    /// Drop a handoff that will never be merged (the run is failing).
    pub fn discard(&self, handoff: Handoff) {
        if let Handoff::Spilled { path, .. } = handoff {
            discard_file(&path);
        }
    }

    pub(crate) fn prepare(&self) -> Result<()> {
        if let Transport::Spill { dir } = self {
            fs::create_dir_all(dir).map_err(|e| TallyError::io("spill", dir, e))?;
        }
        Ok(())
    }
}

/// Create a fresh `partial_<worker>_*.u32le` file in `dir` and fill it with `fill`.
///
/// The name is chosen with an exclusive create, so concurrent runs sharing `dir` never
/// collide. If `fill` fails the file is removed before the error is returned.
pub fn spill_with<F>(dir: &Path, worker: usize, fill: F) -> Result<PathBuf>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let tmp = tempfile::Builder::new()
        .prefix(&format!("partial_{worker:04}_"))
        .suffix(".u32le")
        .tempfile_in(dir)
        .map_err(|e| TallyError::io("spill", dir, e))?;
    {
        let mut w = BufWriter::with_capacity(256 * 1024, tmp.as_file());
        fill(&mut w)
            .and_then(|_| w.flush())
            .map_err(|e| TallyError::io("spill", tmp.path(), e))?;
    }
    let path = tmp
        .into_temp_path()
        .keep()
        .map_err(|e| TallyError::io("spill", dir, e.error))?;
    Ok(path)
}

/// Write `cells` as consecutive little-endian u32 values.
pub fn pack_cells<W: Write + ?Sized>(w: &mut W, cells: &[u32]) -> io::Result<()> {
    for c in cells {
        w.write_all(&c.to_le_bytes())?;
    }
    Ok(())
}

/// Pack `cells` as little-endian u32 into `path`. A partly written file is removed.
pub fn write_packed(path: &Path, cells: &[u32]) -> Result<()> {
    let file = create_with_backoff(path).map_err(|e| TallyError::io("spill", path, e))?;
    let res = (|| -> io::Result<()> {
        let mut w = BufWriter::with_capacity(256 * 1024, file);
        pack_cells(&mut w, cells)?;
        w.flush()
    })();
    if let Err(e) = res {
        discard_file(path);
        return Err(TallyError::io("spill", path, e).into());
    }
    Ok(())
}

fn discard_file(path: &Path) {
    if let Err(e) = remove_with_backoff(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove spilled partial");
    }
}

/// Unpack exactly `cells` little-endian u32 values from `path`; any other byte length
/// is a truncated or foreign file.
pub fn read_packed(path: &Path, cells: usize) -> Result<CounterArray> {
    let mut file = open_with_backoff(path).map_err(|e| TallyError::io("unpack", path, e))?;
    let mut bytes = Vec::with_capacity(cells * CELL_BYTES);
    file.read_to_end(&mut bytes).map_err(|e| TallyError::io("unpack", path, e))?;
    if bytes.len() != cells * CELL_BYTES {
        return Err(TallyError::Io {
            stage: "unpack",
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, found {}", cells * CELL_BYTES, bytes.len()),
            ),
        }
        .into());
    }
    let cells = bytes
        .chunks_exact(CELL_BYTES)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(CounterArray::from_vec(cells))
}
