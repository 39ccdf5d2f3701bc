//! Global retention bounds enforced by each durable store after every insert.
//!
//! Policy application (the actual `DELETE`s) is backend-specific — SQL for
//! `vaultlog-postgres`, in-memory slice truncation for `vaultlog-memory` —
//! but both backends share this policy shape and the same invariant: the
//! current head row (largest `seq`) is never pruned, even past the age
//! bound, and anchors are kept consistent with the rows that remain.

use std::time::Duration;

/// Global retention bounds. Either, both, or neither may be active.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    /// Keep at most this many rows. `None` or `<= 0` disables row-count
    /// based pruning (per the design doc's resolution of the `max_rows < 1`
    /// ambiguity).
    pub max_rows: Option<i64>,
    /// Keep only rows newer than `now - max_age`. `None` disables age-based
    /// pruning.
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    /// No retention bounds active.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Row-count based pruning only.
    #[must_use]
    pub fn max_rows(rows: i64) -> Self {
        Self {
            max_rows: Some(rows),
            max_age: None,
        }
    }

    /// Age based pruning only.
    #[must_use]
    pub fn max_age(age: Duration) -> Self {
        Self {
            max_rows: None,
            max_age: Some(age),
        }
    }

    /// Whether row-count pruning is active (`max_rows` set and `>= 1`).
    #[must_use]
    pub fn row_bound(&self) -> Option<i64> {
        self.max_rows.filter(|&r| r >= 1)
    }

    /// Whether age pruning is active.
    #[must_use]
    pub fn age_bound(&self) -> Option<Duration> {
        self.max_age
    }
}

/// Outcome of a single retention pass, used to drive
/// [`crate::metrics::AuditMetrics`] eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionStats {
    /// Event rows deleted in this pass.
    pub rows_pruned: u64,
    /// Anchor rows deleted (either by row-count overflow or as orphans
    /// after their referenced event row was pruned).
    pub anchors_pruned: u64,
}

impl RetentionStats {
    /// No-op result: nothing was pruned.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_negative_max_rows_disables_row_pruning() {
        assert_eq!(RetentionPolicy::max_rows(0).row_bound(), None);
        assert_eq!(RetentionPolicy::max_rows(-5).row_bound(), None);
        assert_eq!(RetentionPolicy::max_rows(10).row_bound(), Some(10));
    }

    #[test]
    fn default_policy_has_no_bounds() {
        let p = RetentionPolicy::none();
        assert_eq!(p.row_bound(), None);
        assert_eq!(p.age_bound(), None);
    }
}
