//! Batch ranges and the batch plan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// A contiguous, inclusive range of catalog page ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchRange {
    pub start: u32,
    pub end: u32,
}

impl BatchRange {
    /// Create a range. `end` must not be below `start`.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "batch range {}..={} is inverted", start, end);
        Self { start, end }
    }

    /// Pages in increasing order.
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    /// Same start, earlier end (catalog ended inside this batch).
    pub fn truncated(&self, end: u32) -> Option<Self> {
        (end >= self.start && end <= self.end).then(|| Self::new(self.start, end))
    }

    /// Deterministic artifact file name, e.g. `beers_101_200.csv`.
    pub fn artifact_name(&self, prefix: &str) -> String {
        format!("{}_{}_{}.csv", prefix, self.start, self.end)
    }

    /// Inverse of [`artifact_name`](Self::artifact_name).
    pub fn from_artifact_name(prefix: &str, file_name: &str) -> Option<Self> {
        let rest = file_name
            .strip_prefix(prefix)?
            .strip_prefix('_')?
            .strip_suffix(".csv")?;
        let (start, end) = rest.split_once('_')?;
        let start: u32 = start.parse().ok()?;
        let end: u32 = end.parse().ok()?;
        (start >= 1 && start <= end).then(|| Self::new(start, end))
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Fixed-width partition of the catalog into batches.
///
/// Batch `b` covers `start_page + b * batch_size` up to the batch width or
/// the page ceiling, whichever comes first. Without a ceiling the plan is
/// unbounded and the driver stops on end-of-catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    start_page: u32,
    batch_size: u32,
    max_page: Option<u32>,
}

impl BatchPlan {
    /// Create a plan. `start_page` and `batch_size` must be non-zero.
    pub fn new(start_page: u32, batch_size: u32, max_page: Option<u32>) -> Self {
        Self {
            start_page,
            batch_size,
            max_page,
        }
    }

    /// Range of batch `index`, or `None` past the ceiling.
    pub fn batch(&self, index: u32) -> Option<BatchRange> {
        let offset = index.checked_mul(self.batch_size)?;
        let start = self.start_page.checked_add(offset)?;
        let mut end = start.saturating_add(self.batch_size - 1);

        if let Some(max_page) = self.max_page {
            if start > max_page {
                return None;
            }
            end = end.min(max_page);
        }

        Some(BatchRange::new(start, end))
    }

    /// Iterate batches from index 0.
    pub fn iter(&self) -> BatchIter {
        BatchIter {
            plan: *self,
            next_index: 0,
        }
    }
}

/// Iterator over a [`BatchPlan`].
pub struct BatchIter {
    plan: BatchPlan,
    next_index: u32,
}

impl Iterator for BatchIter {
    type Item = (u32, BatchRange);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next_index;
        let range = self.plan.batch(index)?;
        self.next_index = index.checked_add(1)?;
        Some((index, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_with_ceiling_truncates_last_batch() {
        let plan = BatchPlan::new(1, 100, Some(250));
        let ranges: Vec<_> = plan.iter().map(|(_, r)| r).collect();

        assert_eq!(
            ranges,
            vec![
                BatchRange::new(1, 100),
                BatchRange::new(101, 200),
                BatchRange::new(201, 250),
            ]
        );
        assert_eq!(ranges[2].pages().count(), 50);
    }

    #[test]
    fn test_plan_with_offset_start() {
        let plan = BatchPlan::new(11, 10, Some(35));
        assert_eq!(plan.batch(0), Some(BatchRange::new(11, 20)));
        assert_eq!(plan.batch(2), Some(BatchRange::new(31, 35)));
        assert_eq!(plan.batch(3), None);
    }

    #[test]
    fn test_unbounded_plan_keeps_going() {
        let plan = BatchPlan::new(1, 100, None);
        assert_eq!(plan.batch(16), Some(BatchRange::new(1601, 1700)));
        assert_eq!(plan.iter().take(50).count(), 50);
    }

    #[test]
    fn test_artifact_name_round_trip() {
        let range = BatchRange::new(101, 200);
        let name = range.artifact_name("beers");

        assert_eq!(name, "beers_101_200.csv");
        assert_eq!(BatchRange::from_artifact_name("beers", &name), Some(range));
    }

    #[test]
    fn test_from_artifact_name_rejects_foreign_files() {
        assert_eq!(BatchRange::from_artifact_name("beers", "master.csv"), None);
        assert_eq!(BatchRange::from_artifact_name("beers", "beers_5_2.csv"), None);
        assert_eq!(BatchRange::from_artifact_name("beers", "beers_1_2.csv.tmp"), None);
        assert_eq!(BatchRange::from_artifact_name("beers", "ciders_1_2.csv"), None);
    }

    #[test]
    fn test_truncated() {
        let range = BatchRange::new(201, 300);
        assert_eq!(range.truncated(250), Some(BatchRange::new(201, 250)));
        assert_eq!(range.truncated(200), None);
        assert_eq!(range.truncated(301), None);
    }
}
