//! Parallel tally over planned ranges, then an order-independent element-wise merge.

use crate::catalog::PathCatalog;
use crate::concurrency::fan_out;
use crate::config::{TallyOptions, Transport};
use crate::date::DateIndex;
use crate::error::TallyError;
use crate::ranges::ByteRange;
use crate::tally::{tally_range, CounterArray};
use crate::transport::Handoff;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::Path;

/// Tally every range concurrently (range 0 on the calling thread) and sum the results.
///
/// All-or-nothing: if any unit fails, every partial already handed off is discarded and the
/// first error is returned.
pub fn aggregate(
    input: &Path,
    ranges: &[ByteRange],
    catalog: &PathCatalog,
    dates: &DateIndex,
    opts: &TallyOptions,
    pb: Option<&ProgressBar>,
) -> Result<CounterArray> {
    let transport = &opts.transport;
    transport.prepare()?;

    let results = fan_out(ranges, |i, range| -> Result<Handoff> {
        let t = tally_range(input, *range, catalog, dates, &opts.layout, opts.read_buffer_bytes, pb)
            .with_context(|| format!("tally of bytes {}..{}", range.start, range.end))?;
        tracing::debug!(worker = i, bytes = range.len(), lines = t.lines, skipped = t.skipped, "range tallied");
        if i == 0 {
            Ok(Handoff::Owned(t.counts))
        } else {
            transport.send(i, t.counts)
        }
    });

    let merged = collect_partials(transport, results, catalog.cells())?;
    tracing::info!(workers = ranges.len(), cells = merged.len(), "partials merged");
    Ok(merged)
}

/// Fan-in for `aggregate`: receive every handoff and merge them, or, if any unit failed,
/// discard every handoff (spill files included) and return the first error.
pub fn collect_partials(
    transport: &Transport,
    results: Vec<Result<Handoff>>,
    cells: usize,
) -> Result<CounterArray> {
    let mut handoffs = Vec::with_capacity(results.len());
    let mut first_err = None;
    for r in results {
        match r {
            Ok(h) => handoffs.push(h),
            Err(e) if first_err.is_none() => first_err = Some(e),
            Err(_) => {}
        }
    }
    if let Some(e) = first_err {
        for h in handoffs {
            transport.discard(h);
        }
        return Err(e);
    }

    let mut parts = Vec::with_capacity(handoffs.len());
    let mut pending = handoffs.into_iter().enumerate();
    while let Some((i, h)) = pending.next() {
        match transport.receive(i, h, cells) {
            Ok(part) => parts.push(part),
            Err(e) => {
                for (_, rest) in pending {
                    transport.discard(rest);
                }
                return Err(e);
            }
        }
    }
    merge_partials(cells, parts)
}

/// Sum same-shape partial arrays. Order does not matter; an empty list yields zeros.
/// A part of the wrong length is a `Worker` failure of that part's position.
pub fn merge_partials(cells: usize, parts: impl IntoIterator<Item = CounterArray>) -> Result<CounterArray> {
    let mut total = CounterArray::zeroed(cells);
    for (worker, part) in parts.into_iter().enumerate() {
        if part.len() != cells {
            return Err(TallyError::Worker {
                worker,
                reason: format!("partial has {} cells, expected {}", part.len(), cells),
            }
            .into());
        }
        total.merge(&part)?;
    }
    Ok(total)
}
