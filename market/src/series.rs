use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::types::Bar;

pub const DEFAULT_CAPACITY: usize = 100;

/// Immutable, ordered view of a series at one point in time.
pub type SeriesSnapshot = Arc<[Bar]>;

/// What an upsert did to the series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New newest bar (the oldest may have been evicted).
    Appended,
    /// Existing timestamp; bar replaced in place.
    Replaced,
    /// New timestamp between existing bars.
    Inserted,
    /// Older than every bar of a full series; it would be evicted at once.
    Skipped,
}

impl UpsertOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, UpsertOutcome::Skipped)
    }
}

/// Result of merging a batch of historical bars.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    pub inserted: usize,
    pub replaced: usize,
    /// Held bars left untouched: live or already closed by the stream.
    pub kept_live: usize,
    pub rejected: Vec<(u64, ValidationError)>,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

/// Time-ordered, timestamp-deduplicated, size-bounded bar window.
///
/// Invariants after every mutation:
/// - timestamps strictly increasing front to back
/// - `len() <= capacity()`
#[derive(Clone, Debug)]
pub struct BarSeries {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl Default for BarSeries {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BarSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert or replace `bar` by timestamp. Invalid bars are rejected and the
    /// series is left untouched.
    pub fn upsert(&mut self, bar: Bar) -> Result<UpsertOutcome, ValidationError> {
        bar.validate()?;

        let outcome = match self.bars.back() {
            None => {
                self.bars.push_back(bar);
                UpsertOutcome::Appended
            }
            Some(last) if bar.ts_ms > last.ts_ms => {
                self.bars.push_back(bar);
                UpsertOutcome::Appended
            }
            // Hot path: the in-progress bar ticking in place.
            Some(last) if bar.ts_ms == last.ts_ms => {
                if let Some(slot) = self.bars.back_mut() {
                    *slot = bar;
                }
                UpsertOutcome::Replaced
            }
            Some(_) => match self.bars.binary_search_by_key(&bar.ts_ms, |b| b.ts_ms) {
                Ok(i) => {
                    self.bars[i] = bar;
                    UpsertOutcome::Replaced
                }
                Err(0) if self.bars.len() >= self.capacity => UpsertOutcome::Skipped,
                Err(i) => {
                    self.bars.insert(i, bar);
                    UpsertOutcome::Inserted
                }
            },
        };

        self.evict_overflow();
        Ok(outcome)
    }

    /// Clear the series and load `bars` (any order). Invalid bars are skipped
    /// and returned alongside their timestamps.
    pub fn seed(&mut self, bars: impl IntoIterator<Item = Bar>) -> Vec<(u64, ValidationError)> {
        self.bars.clear();
        let mut rejected = Vec::new();
        for bar in bars {
            if let Err(e) = self.upsert(bar) {
                rejected.push((bar.ts_ms, e));
            }
        }
        rejected
    }

    /// Merge historical bars without regressing live data.
    ///
    /// Missing bars are always added. A bar already held is kept as is when
    /// it is at or after the newest timestamp (the stream may hold fresher
    /// values) or at or before `closed_through`, the newest bar the stream
    /// has closed. Anything else held is replaced by the historical copy.
    pub fn merge_history(
        &mut self,
        bars: impl IntoIterator<Item = Bar>,
        closed_through: Option<u64>,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for bar in bars {
            let newest = self.latest().map(|b| b.ts_ms);
            let live = newest.is_some_and(|n| bar.ts_ms >= n);
            let closed = closed_through.is_some_and(|c| bar.ts_ms <= c);
            if (live || closed) && self.contains(bar.ts_ms) {
                report.kept_live += 1;
                continue;
            }

            match self.upsert(bar) {
                Ok(UpsertOutcome::Appended | UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Replaced) => report.replaced += 1,
                Ok(UpsertOutcome::Skipped) => {}
                Err(e) => report.rejected.push((bar.ts_ms, e)),
            }
        }

        report
    }

    fn evict_overflow(&mut self) {
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
    }

    pub fn contains(&self, ts_ms: u64) -> bool {
        self.bars
            .binary_search_by_key(&ts_ms, |b| b.ts_ms)
            .is_ok()
    }

    /// Copy-on-read view; later mutations never affect it.
    pub fn snapshot(&self) -> SeriesSnapshot {
        self.bars.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn oldest(&self) -> Option<&Bar> {
        self.bars.front()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }
}
