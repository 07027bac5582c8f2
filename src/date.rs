//! Dense calendar-date index: every day of the configured year range, in chronological order.

use crate::config::{CalendarRange, DATE_LEN};
use anyhow::{anyhow, Result};
use ahash::RandomState;
use std::collections::HashMap;
use time::macros::format_description;
use time::{Date, Month};

/// `labels[id]` is the `YYYY-MM-DD` label of date `id`; ids ascend chronologically,
/// so iterating `0..len()` needs no sort step.
#[derive(Clone, Debug)]
pub struct DateIndex {
    labels: Vec<String>,
    ids: HashMap<[u8; DATE_LEN], u32, RandomState>,
}

impl DateIndex {
    /// Enumerate Jan 1 of `first_year` through Dec 31 of `last_year`, inclusive.
    pub fn build(range: CalendarRange) -> Result<Self> {
        range.validate()?;
        let fmt = format_description!("[year]-[month]-[day]");
        let mut day = Date::from_calendar_date(range.first_year, Month::January, 1)?;
        let last = Date::from_calendar_date(range.last_year, Month::December, 31)?;

        let span = (last - day).whole_days() as usize + 1;
        let mut labels = Vec::with_capacity(span);
        let mut ids = HashMap::with_capacity_and_hasher(span, RandomState::new());
        loop {
            let label = day.format(&fmt)?;
            let key: [u8; DATE_LEN] = label
                .as_bytes()
                .try_into()
                .map_err(|_| anyhow!("date label {label:?} is not {DATE_LEN} bytes"))?;
            ids.insert(key, labels.len() as u32);
            labels.push(label);
            if day == last {
                break;
            }
            day = day.next_day().ok_or_else(|| anyhow!("calendar overflow after {day}"))?;
        }
        Ok(Self { labels, ids })
    }

    #[inline]
    pub fn id_of(&self, date: &[u8]) -> Option<u32> {
        let key: &[u8; DATE_LEN] = date.try_into().ok()?;
        self.ids.get(key).copied()
    }

    #[inline]
    pub fn label(&self, id: usize) -> &str {
        &self.labels[id]
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
