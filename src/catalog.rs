//! Path discovery: one sequential pass that assigns every distinct path a dense base offset
//! (a multiple of the date count) in first-seen order.

use crate::config::LineLayout;
use crate::error::TallyError;
use crate::lines::{for_each_complete_line, split_fields};
use crate::util::open_with_backoff;
use ahash::RandomState;
use anyhow::Result;
use indicatif::ProgressBar;
use memchr::memrchr;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Distinct paths, in first-seen order, with their block offsets into a counter array.
/// Read-only once built; shared by reference with every tally worker.
#[derive(Clone, Debug)]
pub struct PathCatalog {
    offsets: HashMap<Vec<u8>, usize, RandomState>,
    labels: Vec<Vec<u8>>,
    date_count: usize,
}

impl PathCatalog {
    pub fn new(date_count: usize) -> Self {
        Self {
            offsets: HashMap::with_hasher(RandomState::new()),
            labels: Vec::new(),
            date_count,
        }
    }

    /// Register `path` if unseen. Offsets are `index * date_count`.
    #[inline]
    pub fn observe(&mut self, path: &[u8]) {
        if !self.offsets.contains_key(path) {
            let offset = self.labels.len() * self.date_count;
            self.offsets.insert(path.to_vec(), offset);
            self.labels.push(path.to_vec());
        }
    }

    /// Stream the first `file_size` bytes of `input` once in `read_buf_bytes` blocks and
    /// register every path.
    ///
    /// A line split across two blocks is carried into the next read; bytes after the
    /// last newline are never a complete line and are not registered. Bytes appended
    /// past `file_size` are ignored, as no tally range covers them.
    pub fn discover(
        input: &Path,
        layout: &LineLayout,
        date_count: usize,
        file_size: u64,
        read_buf_bytes: usize,
        pb: Option<&ProgressBar>,
    ) -> Result<Self> {
        let mut file = open_with_backoff(input)
            .map_err(|e| TallyError::io("open", input, e))?
            .take(file_size);
        let mut catalog = Self::new(date_count);

        let block_len = read_buf_bytes.max(1);
        let mut block = vec![0u8; block_len];
        let mut carry: Vec<u8> = Vec::with_capacity(block_len);
        let mut lines = 0u64;

        loop {
            let n = file.read(&mut block).map_err(|e| TallyError::io("read", input, e))?;
            if n == 0 {
                break;
            }
            if let Some(pb) = pb {
                pb.inc(n as u64);
            }
            let fresh = &block[..n];
            let Some(last_nl) = memrchr(b'\n', fresh) else {
                carry.extend_from_slice(fresh);
                continue;
            };

            let mut on_line = |line: &[u8]| {
                lines += 1;
                if let Some(fields) = split_fields(line, layout) {
                    catalog.observe(fields.path);
                }
            };
            if carry.is_empty() {
                for_each_complete_line(&fresh[..=last_nl], &mut on_line);
            } else {
                carry.extend_from_slice(&fresh[..=last_nl]);
                for_each_complete_line(&carry, &mut on_line);
                carry.clear();
            }
            carry.extend_from_slice(&fresh[last_nl + 1..]);
        }

        if !carry.is_empty() {
            tracing::debug!(bytes = carry.len(), "discovery: ignoring unterminated final line");
        }
        tracing::info!(paths = catalog.len(), lines, "discovery pass complete");
        Ok(catalog)
    }

    #[inline]
    pub fn offset_of(&self, path: &[u8]) -> Option<usize> {
        self.offsets.get(path).copied()
    }

    /// Path bytes for catalog index `index` (not offset).
    #[inline]
    pub fn label(&self, index: usize) -> &[u8] {
        &self.labels[index]
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    pub fn date_count(&self) -> usize {
        self.date_count
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of cells in a counter array shaped for this catalog.
    pub fn cells(&self) -> usize {
        self.labels.len() * self.date_count
    }
}
