//! Proportional day allocation
//!
//! A line item covers an arbitrary billing interval: an hour, a day, or a
//! whole month. To store cost per calendar day, the item's amount is scaled
//! by the fraction of its interval that overlaps the day.
//!
//! # Examples
//!
//! ```
//! use cct_core::allocation::{calculate_ratio, DayAllocator};
//! use cct_core::types::{Cloud, Interval, RawCostRecord, TargetDay};
//! use chrono::{NaiveDate, TimeZone, Utc};
//!
//! let interval = Interval::new(
//!     Utc.with_ymd_and_hms(2018, 6, 10, 0, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2018, 6, 20, 0, 0, 0).unwrap(),
//! )
//! .unwrap();
//! let day = TargetDay::utc(NaiveDate::from_ymd_opt(2018, 6, 12).unwrap());
//! assert!((calculate_ratio(&interval, &day) - 0.1).abs() < 1e-9);
//!
//! let record = RawCostRecord::new(20.0, "USD", interval, "AmazonEC2");
//! let allocated = DayAllocator::new(Cloud::Aws).allocate(&record, &day).unwrap();
//! assert!((allocated.cost() - 2.0).abs() < 1e-9);
//! assert_eq!(allocated.labels()["service"], "AmazonEC2");
//! ```

use crate::error::{CctError, Result};
use crate::filters::RecordFilter;
use crate::identity::identity_labels;
use crate::types::{Cloud, Interval, NormalizedCostRecord, RawCostRecord, TargetDay};
use std::collections::BTreeMap;
use tracing::debug;

/// Length of the intersection of `[a_start, a_stop)` and `[b_start, b_stop)`
///
/// Disjoint or touching intervals overlap by zero. An inverted interval
/// (`start > stop`) also yields zero.
pub fn overlap_seconds(a_start: i64, a_stop: i64, b_start: i64, b_stop: i64) -> i64 {
    a_stop
        .min(b_stop)
        .saturating_sub(a_start.max(b_start))
        .max(0)
}

/// Fraction of `interval` that falls on `day`, in `[0, 1]`
///
/// A zero-length interval is an instant: it belongs entirely to the day
/// containing it and to no other.
pub fn calculate_ratio(interval: &Interval, day: &TargetDay) -> f64 {
    let length = interval.duration_seconds();
    if length == 0 {
        return if day.contains(interval.start()) {
            1.0
        } else {
            0.0
        };
    }

    let overlap = overlap_seconds(
        interval.start().timestamp(),
        interval.stop().timestamp(),
        day.start().timestamp(),
        day.stop().timestamp(),
    );
    (overlap as f64 / length as f64).clamp(0.0, 1.0)
}

/// A record rejected during batch allocation
#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record in the input batch
    pub index: usize,
    /// Identity of the rejected record
    pub identity: String,
    /// Why it was rejected
    pub error: CctError,
}

/// Outcome of allocating a batch of records to one day
#[derive(Debug, Default)]
pub struct AllocationReport {
    /// Allocated records that passed the filter
    pub records: Vec<NormalizedCostRecord>,
    /// Records that could not be allocated
    pub failures: Vec<RecordFailure>,
    /// Records dropped by the filter
    pub skipped: usize,
}

impl AllocationReport {
    /// True when no record failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Sum of allocated cost per currency
    pub fn totals_by_currency(&self) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for record in &self.records {
            *totals.entry(record.currency().to_string()).or_insert(0.0) += record.cost();
        }
        totals
    }
}

/// Allocates raw line items from one cloud onto calendar days
///
/// The allocator holds only configuration; every call is independent and
/// it can be shared freely between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayAllocator {
    cloud: Cloud,
    filter: RecordFilter,
}

impl DayAllocator {
    /// Create an allocator for `cloud` that keeps every record
    pub fn new(cloud: Cloud) -> Self {
        Self {
            cloud,
            filter: RecordFilter::default(),
        }
    }

    /// Set the filter applied by [`DayAllocator::allocate_batch`]
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Cloud whose identities this allocator parses
    pub fn cloud(&self) -> Cloud {
        self.cloud
    }

    /// Filter applied to batches
    pub fn filter(&self) -> RecordFilter {
        self.filter
    }

    /// Allocate one record to `day`
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentity` if the record's identity cannot be parsed
    /// for this allocator's cloud, and `InvalidRecord` if its amount is not a
    /// finite number.
    pub fn allocate(&self, record: &RawCostRecord, day: &TargetDay) -> Result<NormalizedCostRecord> {
        let ratio = calculate_ratio(record.interval(), day);
        self.normalize(record, day, ratio)
    }

    fn normalize(
        &self,
        record: &RawCostRecord,
        day: &TargetDay,
        ratio: f64,
    ) -> Result<NormalizedCostRecord> {
        if !record.amount().is_finite() {
            return Err(CctError::InvalidRecord(format!(
                "amount {} of {} is not a finite number",
                record.amount(),
                record.identity()
            )));
        }

        let mut labels = identity_labels(self.cloud, record.identity())?;
        labels.insert("cloud".to_string(), self.cloud.to_string());
        labels.insert("currency".to_string(), record.currency().to_string());

        Ok(NormalizedCostRecord::new(
            record.amount() * ratio,
            record.currency(),
            day.reference_instant(),
            labels,
        ))
    }

    /// Allocate every record in `records` to `day`
    ///
    /// A failing record never stops the batch; it is reported in
    /// [`AllocationReport::failures`] together with its position.
    pub fn allocate_batch(&self, records: &[RawCostRecord], day: &TargetDay) -> AllocationReport {
        let mut report = AllocationReport::default();

        for (index, record) in records.iter().enumerate() {
            let ratio = calculate_ratio(record.interval(), day);
            if self.filter.rejects_ratio(ratio) {
                report.skipped += 1;
                continue;
            }

            match self.normalize(record, day, ratio) {
                Ok(normalized) if self.filter.rejects(&normalized) => report.skipped += 1,
                Ok(normalized) => report.records.push(normalized),
                Err(error) => report.failures.push(RecordFailure {
                    index,
                    identity: record.identity().to_string(),
                    error,
                }),
            }
        }

        debug!(
            "Allocated {} of {} records to {} ({} skipped, {} failed)",
            report.records.len(),
            records.len(),
            day,
            report.skipped,
            report.failures.len()
        );

        report
    }
}
