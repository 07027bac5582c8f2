//! Newline-aligned byte ranges, one per worker.

use crate::error::TallyError;
use crate::util::open_with_backoff;
use anyhow::Result;
use memchr::memchr;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const SCAN_BLOCK: usize = 64 * 1024;

/// Half-open `[start, end)` byte span of the input. Never splits a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Split `input` (of `file_size` bytes) into exactly `workers` contiguous ranges.
///
/// Boundary `i` starts at `i * (file_size / workers)` and is pushed forward to just past
/// the next newline, or to `file_size` when there is none. Ranges are therefore only
/// roughly equal; trailing ones may be empty.
pub fn plan(input: &Path, file_size: u64, workers: usize) -> Result<Vec<ByteRange>> {
    let workers = workers.max(1);
    let segment = file_size / workers as u64;

    let mut boundaries = Vec::with_capacity(workers + 1);
    boundaries.push(0u64);
    if workers > 1 {
        let mut file = open_with_backoff(input).map_err(|e| TallyError::io("open", input, e))?;
        let mut scratch = vec![0u8; SCAN_BLOCK];
        for i in 1..workers {
            let at = i as u64 * segment;
            let b = if at >= file_size {
                file_size
            } else {
                next_line_start(&mut file, at, file_size, &mut scratch)
                    .map_err(|e| TallyError::io("seek", input, e))?
            };
            boundaries.push(b);
        }
    }
    boundaries.push(file_size);

    let ranges: Vec<ByteRange> = boundaries.windows(2).map(|w| ByteRange::new(w[0], w[1])).collect();
    tracing::debug!(?ranges, "planned byte ranges");
    Ok(ranges)
}

/// Position just after the first `\n` at or after `from`, or `file_size` if none.
fn next_line_start<R: Read + Seek>(
    file: &mut R,
    from: u64,
    file_size: u64,
    scratch: &mut [u8],
) -> std::io::Result<u64> {
    file.seek(SeekFrom::Start(from))?;
    let mut pos = from;
    while pos < file_size {
        let n = file.read(scratch)?;
        if n == 0 {
            break;
        }
        if let Some(i) = memchr(b'\n', &scratch[..n]) {
            return Ok((pos + i as u64 + 1).min(file_size));
        }
        pos += n as u64;
    }
    Ok(file_size)
}
