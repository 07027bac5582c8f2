//! Fixed-width field slicing and newline-delimited block iteration.
//! Both passes (discovery and tally) go through the same helpers so they agree
//! byte-for-byte on which lines are usable.

use crate::config::{LineLayout, DATE_LEN};
use memchr::memchr_iter;

/// The two fields a tally needs out of one line (without its `\n`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fields<'a> {
    pub path: &'a [u8],
    pub date: &'a [u8],
}

/// Slice `path` and `date` out of a line. Returns `None` for lines shorter than
/// `layout.min_line_len()`, or when the layout's datetime field is too short to hold a
/// date; no other validation is done.
#[inline]
pub fn split_fields<'a>(line: &'a [u8], layout: &LineLayout) -> Option<Fields<'a>> {
    if line.len() < layout.min_line_len() {
        return None;
    }
    let datetime_at = line.len() - layout.datetime_len;
    Some(Fields {
        path: line.get(layout.prefix_len..datetime_at - 1)?,
        date: line.get(datetime_at..datetime_at + DATE_LEN)?,
    })
}

/// Call `on_line` for every `\n`-terminated line in `block` (terminator stripped).
/// Bytes after the last newline are ignored; returns the number of bytes consumed.
#[inline]
pub fn for_each_complete_line(block: &[u8], mut on_line: impl FnMut(&[u8])) -> usize {
    let mut start = 0usize;
    for nl in memchr_iter(b'\n', block) {
        on_line(&block[start..nl]);
        start = nl + 1;
    }
    start
}
