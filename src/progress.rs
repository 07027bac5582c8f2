//! Progress reporting: byte-based bars for the discovery and tally passes.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BYTES_TEMPLATE: &str = "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
     {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";

pub fn make_progress_bar_labeled(total_bytes: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    if let Ok(style) = ProgressStyle::with_template(BYTES_TEMPLATE) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// `Some(bar)` when progress is enabled. The bar is cheap to clone and shared across workers.
pub fn maybe_progress(enabled: bool, total_bytes: u64, label: &str) -> Option<ProgressBar> {
    enabled.then(|| make_progress_bar_labeled(total_bytes, label))
}
