use crate::aggregate::aggregate;
use crate::catalog::PathCatalog;
use crate::config::{CalendarRange, LineLayout, TallyOptions, Transport};
use crate::date::DateIndex;
use crate::error::TallyError;
use crate::output::VisitReport;
use crate::progress::maybe_progress;
use crate::ranges::plan;
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Entry point: date index, path discovery, range planning, parallel tally, merge, write.
#[derive(Clone, Default)]
pub struct VisitTally {
    pub(crate) opts: TallyOptions,
}

/// What a completed `run` did.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub paths: usize,
    pub dates: usize,
    pub workers: usize,
    pub input_bytes: u64,
    pub visits: u64,
    pub elapsed_ms: u128,
}

impl VisitTally {
    pub fn new() -> Self {
        Self { opts: TallyOptions::default() }
    }

    pub fn with_options(opts: TallyOptions) -> Self {
        Self { opts }
    }

    // -------- Builder methods --------
    pub fn layout(mut self, layout: LineLayout) -> Self { self.opts = self.opts.with_layout(layout); self }
    pub fn calendar(mut self, calendar: CalendarRange) -> Self { self.opts = self.opts.with_calendar(calendar); self }
    pub fn workers(mut self, n: usize) -> Self { self.opts = self.opts.with_workers(n); self }
    pub fn transport(mut self, transport: Transport) -> Self { self.opts = self.opts.with_transport(transport); self }
    pub fn spill_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_spill_dir(dir); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn pretty(mut self, yes: bool) -> Self { self.opts = self.opts.with_pretty(yes); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn io_write_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_write_buffer(bytes); self }

    pub fn options(&self) -> &TallyOptions {
        &self.opts
    }

    /// Count visits in `input` and return the merged report without writing it.
    pub fn count(&self, input: &Path) -> Result<VisitReport> {
        init_tracing_once();
        self.opts.validate()?;
        let opts = &self.opts;

        let file_size = fs::metadata(input)
            .map_err(|e| TallyError::io("open", input, e))
            .with_context(|| format!("stat {}", input.display()))?
            .len();

        let dates = DateIndex::build(opts.calendar)?;
        tracing::info!(dates = dates.len(), first = ?opts.calendar.first_year, last = ?opts.calendar.last_year, "date index built");

        let pb = maybe_progress(opts.progress, file_size, "Discovering paths");
        let catalog = PathCatalog::discover(input, &opts.layout, dates.len(), file_size, opts.read_buffer_bytes, pb.as_ref())
            .with_context(|| format!("discovering paths in {}", input.display()))?;
        if let Some(pb) = pb { pb.finish_with_message("paths discovered"); }

        let ranges = plan(input, file_size, opts.workers)
            .with_context(|| format!("planning ranges over {}", input.display()))?;
        tracing::info!(workers = ranges.len(), file_size, "byte ranges planned");

        let pb = maybe_progress(opts.progress, file_size, "Tallying visits");
        let counts = aggregate(input, &ranges, &catalog, &dates, opts, pb.as_ref())
            .with_context(|| format!("tallying {}", input.display()))?;
        if let Some(pb) = pb { pb.finish_with_message("done"); }

        Ok(VisitReport { dates, catalog, counts, input_bytes: file_size })
    }

    /// Count visits in `input` and write the JSON report to `output`.
    pub fn run(&self, input: &Path, output: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        let report = self.count(input)?;
        report.write_to_file(output, self.opts.pretty, self.opts.write_buffer_bytes)?;

        let summary = RunSummary {
            paths: report.catalog.len(),
            dates: report.dates.len(),
            workers: self.opts.workers,
            input_bytes: report.input_bytes,
            visits: report.total(),
            elapsed_ms: started.elapsed().as_millis(),
        };
        tracing::info!(paths = summary.paths, visits = summary.visits, elapsed_ms = summary.elapsed_ms as u64, "run complete");
        Ok(summary)
    }
}
