//! Filtering of allocated records
//!
//! A month-long report yields one line item per resource and usage window,
//! most of which do not touch the day being allocated. The filter lets the
//! caller drop those, and records whose allocated cost is zero, before they
//! reach a sink.
//!
//! # Examples
//!
//! ```
//! use cct_core::filters::RecordFilter;
//!
//! let filter = RecordFilter::new().with_skip_out_of_range(true);
//! assert!(filter.rejects_ratio(0.0));
//! assert!(!filter.rejects_ratio(0.25));
//! ```

use crate::types::NormalizedCostRecord;

/// Filter configuration for allocated records
///
/// Both checks are off by default, so a default filter keeps every record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordFilter {
    /// Drop records whose interval does not overlap the day
    pub skip_out_of_range: bool,
    /// Drop records whose allocated cost is zero
    pub skip_zero_cost: bool,
}

impl RecordFilter {
    /// Create a filter that keeps everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter that drops both out-of-range and zero-cost records
    pub fn skip_empty() -> Self {
        Self {
            skip_out_of_range: true,
            skip_zero_cost: true,
        }
    }

    /// Set whether out-of-range records are dropped
    pub fn with_skip_out_of_range(mut self, skip: bool) -> Self {
        self.skip_out_of_range = skip;
        self
    }

    /// Set whether zero-cost records are dropped
    pub fn with_skip_zero_cost(mut self, skip: bool) -> Self {
        self.skip_zero_cost = skip;
        self
    }

    /// Check a day ratio before the record is normalized
    pub fn rejects_ratio(&self, ratio: f64) -> bool {
        self.skip_out_of_range && ratio == 0.0
    }

    /// Check a normalized record
    pub fn rejects(&self, record: &NormalizedCostRecord) -> bool {
        self.skip_zero_cost && record.cost() == 0.0
    }
}
