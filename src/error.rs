use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds of a tally run. All of them abort the run; malformed log lines never
/// reach this type because they are skipped at the line level.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("I/O error during {stage}: {source} (path: {path})")]
    Io {
        stage: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to spawn tally worker {worker}: {source}")]
    Spawn { worker: usize, source: io::Error },

    #[error("tally worker {worker} failed: {reason}")]
    Worker { worker: usize, reason: String },

    #[error("failed to serialize visit report: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TallyError {
    pub(crate) fn io(stage: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        TallyError::Io { stage, path: path.into(), source }
    }
}
