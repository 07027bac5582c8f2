mod config;
mod error;
mod date;
mod lines;
mod catalog;
mod ranges;
mod tally;
mod concurrency;
mod transport;
mod aggregate;
mod output;
mod pipeline;

mod progress;
mod util;

pub use crate::config::{CalendarRange, LineLayout, TallyOptions, Transport, DATE_LEN};
pub use crate::error::TallyError;
pub use crate::pipeline::{RunSummary, VisitTally};

// Pipeline stages, usable on their own.
pub use crate::date::DateIndex;
pub use crate::catalog::PathCatalog;
pub use crate::ranges::{plan, ByteRange};
pub use crate::tally::{tally_range, CounterArray, Tally};
pub use crate::aggregate::{aggregate, collect_partials, merge_partials};
pub use crate::output::VisitReport;

// Line slicing shared by discovery and tally.
pub use crate::lines::{for_each_complete_line, split_fields, Fields};

// Partial-array handoff and the fan-out helper behind it.
pub use crate::transport::{pack_cells, read_packed, spill_with, write_packed, Handoff};
pub use crate::concurrency::fan_out;

pub use crate::util::init_tracing_once;
