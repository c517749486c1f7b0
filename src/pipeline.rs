//! Day-by-day collection pipeline
//!
//! For each target day: drain the source, allocate the line items to the
//! day, write the survivors to the sink. A day either completes or fails as
//! a whole; records already flushed by the sink are not rolled back.

use cct_core::allocation::DayAllocator;
use cct_core::error::{CctError, Result};
use cct_core::source::{CostSink, CostSource};
use cct_core::timezone::TimezoneConfig;
use cct_core::types::TargetDay;
use chrono::NaiveDate;
use futures::StreamExt;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Outcome of one completed day
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// Day the records were allocated to
    pub day: TargetDay,
    /// Records handed to the sink
    pub written: usize,
    /// Records dropped by the filter
    pub skipped: usize,
    /// Records that could not be read or allocated
    pub failed: usize,
    /// Allocated cost per currency
    pub totals_by_currency: BTreeMap<String, f64>,
}

/// Outcome of a range of days
#[derive(Debug, Default)]
pub struct RangeOutcome {
    /// Days that completed
    pub completed: Vec<DaySummary>,
    /// Days that failed, with the error that stopped them
    pub failed: Vec<(TargetDay, CctError)>,
}

impl RangeOutcome {
    /// Whether every day completed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Target days from `since` to `until`, both inclusive
pub fn target_days(since: NaiveDate, until: NaiveDate, tz: &TimezoneConfig) -> Vec<TargetDay> {
    std::iter::successors(Some(tz.day(since)), TargetDay::next)
        .take_while(|day| day.date() <= until)
        .collect()
}

/// Collect, allocate and store the costs of one day
///
/// Record-level errors from the source or the allocator are counted and
/// logged; any other source error, or a sink error, fails the day.
pub async fn run_day(
    source: &dyn CostSource,
    allocator: &DayAllocator,
    sink: &dyn CostSink,
    day: &TargetDay,
) -> Result<DaySummary> {
    info!("Collecting {} costs for {}", source.cloud(), day);

    let mut stream = source.cost_records(day);
    let mut records = Vec::new();
    let mut failed = 0;

    while let Some(item) = stream.next().await {
        match item {
            Ok(record) => records.push(record),
            Err(e) if e.is_record_level() => {
                warn!("Skipping unreadable record: {}", e);
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }
    debug!("Received {} records from {}", records.len(), source.cloud());

    let report = allocator.allocate_batch(&records, day);
    for failure in &report.failures {
        warn!(
            "Unable to allocate record {} ({}): {}",
            failure.index, failure.identity, failure.error
        );
    }

    sink.write(&report.records).await?;

    let summary = DaySummary {
        day: *day,
        written: report.records.len(),
        skipped: report.skipped,
        failed: failed + report.failures.len(),
        totals_by_currency: report.totals_by_currency(),
    };

    info!(
        "{}: {} written, {} skipped, {} failed",
        summary.day, summary.written, summary.skipped, summary.failed
    );
    for (currency, total) in &summary.totals_by_currency {
        info!("{}: total {:.2} {}", summary.day, total, currency);
    }

    Ok(summary)
}

/// Run every day in `days` in order
///
/// A failing day is logged and the remaining days still run.
pub async fn run_range(
    source: &dyn CostSource,
    allocator: &DayAllocator,
    sink: &dyn CostSink,
    days: &[TargetDay],
) -> RangeOutcome {
    let mut outcome = RangeOutcome::default();

    for day in days {
        match run_day(source, allocator, sink, day).await {
            Ok(summary) => outcome.completed.push(summary),
            Err(e) => {
                error!("Failed to collect costs for {}: {}", day, e);
                outcome.failed.push((*day, e));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_target_days_inclusive() {
        let tz = TimezoneConfig::default();
        let days = target_days(date(2018, 6, 29), date(2018, 7, 2), &tz);
        let dates: Vec<NaiveDate> = days.iter().map(TargetDay::date).collect();
        assert_eq!(
            dates,
            vec![date(2018, 6, 29), date(2018, 6, 30), date(2018, 7, 1), date(2018, 7, 2)]
        );
    }

    #[test]
    fn test_target_days_single_and_empty() {
        let tz = TimezoneConfig::default();
        assert_eq!(target_days(date(2018, 7, 3), date(2018, 7, 3), &tz).len(), 1);
        assert!(target_days(date(2018, 7, 4), date(2018, 7, 3), &tz).is_empty());
    }

    #[test]
    fn test_target_days_follow_timezone() {
        let tz = TimezoneConfig::from_cli(Some("Europe/Stockholm"), false).unwrap();
        let days = target_days(date(2018, 3, 24), date(2018, 3, 26), &tz);
        let hours: Vec<i64> = days
            .iter()
            .map(|day| (day.stop() - day.start()).num_hours())
            .collect();
        assert_eq!(hours, vec![24, 23, 24]);
    }

    #[test]
    fn test_range_outcome_success() {
        let outcome = RangeOutcome::default();
        assert!(outcome.is_success());
    }
}
