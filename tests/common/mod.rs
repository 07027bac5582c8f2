#![allow(dead_code)]

use logtally::VisitTally;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PREFIX: &str = "https://stitcher.io";

/// One access-log line (no terminator) in the default layout.
pub fn line(path: &str, datetime: &str) -> String {
    format!("{PREFIX}{path},{datetime}")
}

/// A visit to `path` on `date` (`YYYY-MM-DD`) at a fixed time of day.
pub fn visit(path: &str, date: &str) -> String {
    line(path, &format!("{date}T10:00:00+00:00"))
}

/// Write `lines` to `dir/name`, each terminated by `\n`.
pub fn write_log(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let mut bytes = Vec::new();
    for l in lines {
        bytes.extend_from_slice(l.as_bytes());
        bytes.push(b'\n');
    }
    write_raw(dir, name, &bytes)
}

/// Write raw bytes to `dir/name` (for files without a trailing newline etc.).
pub fn write_raw(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(bytes).unwrap();
    path
}

/// Library defaults with progress bars off, as every test wants.
pub fn quiet() -> VisitTally {
    VisitTally::new().progress(false)
}

/// Deterministic synthetic log: `n` lines over a handful of paths and dates, including
/// dates outside the default calendar, an impossible date and some short garbage lines.
/// Returns the lines and how many of them should be counted.
pub fn synthetic_log(n: usize, seed: u64) -> (Vec<String>, u64) {
    const PATHS: [&str; 7] = [
        "/blog/a",
        "/blog/b-much-longer-slug-for-variety",
        "/",
        "/rss",
        "/blog/%C3%A9t%C3%A9",
        "/blog/\"quoted\"",
        "/blog/c",
    ];
    // The first six are inside 2020..=2026; the rest never match.
    const DATES: [&str; 9] = [
        "2020-01-01",
        "2021-06-15",
        "2023-12-31",
        "2024-02-29",
        "2025-07-04",
        "2026-12-31",
        "2019-12-31",
        "2027-01-01",
        "2023-02-29",
    ];

    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    let mut lines = Vec::with_capacity(n);
    let mut counted = 0u64;
    for _ in 0..n {
        if next() % 17 == 0 {
            lines.push("garbage".to_string());
            continue;
        }
        let path = PATHS[next() % PATHS.len()];
        let di = next() % DATES.len();
        if di < 6 {
            counted += 1;
        }
        lines.push(visit(path, DATES[di]));
    }
    (lines, counted)
}
