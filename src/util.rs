use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .try_init();
    });
}

// -------- robust file ops with backoff (Windows/NAS-friendly) --------

const TRIES: usize = 16;
const DELAY_MS: u64 = 50;

/// Return true for transient/retriable I/O errors often seen on Windows when
/// filter drivers (AV/backup), USB/NAS volumes, or sharing violations occur.
fn is_retriable_io_error(e: &io::Error) -> bool {
    // 5 access denied, 32 sharing violation, 33 lock violation, 21 device not ready,
    // 1006 volume altered, 1117 device I/O error, 1224 user-mapped section open.
    matches!(e.raw_os_error(), Some(5 | 21 | 32 | 33 | 1006 | 1117 | 1224))
}

/// Run `op` up to `TRIES` times, sleeping a little longer after each transient failure.
fn with_backoff<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err = None;
    for i in 0..TRIES {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(DELAY_MS.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("retries exhausted")))
}

pub fn open_with_backoff(path: &Path) -> io::Result<File> {
    with_backoff(|| File::open(path))
}

pub fn create_with_backoff(path: &Path) -> io::Result<File> {
    with_backoff(|| File::create(path))
}

/// Remove a file; succeeds if it is already gone.
pub fn remove_with_backoff(path: &Path) -> Result<()> {
    with_backoff(|| match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    })
    .with_context(|| format!("remove {}", path.display()))
}

/// Replace `dest` with `tmp`. If rename fails (e.g., due to sharing), fall back to copy+remove.
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    if with_backoff(|| fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    with_backoff(|| fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    remove_with_backoff(tmp)
}
