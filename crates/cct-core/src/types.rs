//! Core domain types for cloud-cost-tracker
//!
//! This module contains the data model shared by sources, the allocator and
//! sinks: billing intervals, raw line items, the calendar day being
//! allocated to, and the normalized records handed to a sink.

use crate::error::{CctError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label set attached to a normalized cost record.
///
/// A `BTreeMap` keeps iteration order deterministic, which makes the
/// points written to the database byte-stable across runs.
pub type Labels = BTreeMap<String, String>;

/// Cloud provider a cost record originates from
///
/// # Examples
/// ```
/// use cct_core::types::Cloud;
/// use std::str::FromStr;
///
/// assert_eq!(Cloud::from_str("AWS").unwrap(), Cloud::Aws);
/// assert_eq!(Cloud::Azure.to_string(), "azure");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cloud {
    /// Microsoft Azure consumption data
    Azure,
    /// AWS Cost and Usage Reports
    Aws,
}

impl fmt::Display for Cloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Azure => write!(f, "azure"),
            Self::Aws => write!(f, "aws"),
        }
    }
}

impl std::str::FromStr for Cloud {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "aws" => Ok(Self::Aws),
            _ => Err(format!("Cloud provider {s} is not supported")),
        }
    }
}

/// Half-open time range `[start, stop)`
///
/// Construction rejects `start > stop`; `start == stop` is a legal
/// zero-length interval.
///
/// # Examples
/// ```
/// use cct_core::types::Interval;
/// use chrono::{TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2018, 6, 10, 0, 0, 0).unwrap();
/// let stop = Utc.with_ymd_and_hms(2018, 6, 20, 0, 0, 0).unwrap();
///
/// let interval = Interval::new(start, stop).unwrap();
/// assert_eq!(interval.duration_seconds(), 10 * 86_400);
/// assert!(Interval::new(stop, start).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IntervalBounds")]
pub struct Interval {
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
}

/// Unchecked interval bounds, validated through [`Interval::new`] when deserializing
#[derive(Deserialize)]
struct IntervalBounds {
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
}

impl TryFrom<IntervalBounds> for Interval {
    type Error = CctError;

    fn try_from(bounds: IntervalBounds) -> Result<Self> {
        Self::new(bounds.start, bounds.stop)
    }
}

impl Interval {
    /// Create a new interval, failing with `InvalidInterval` when `start > stop`
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self> {
        if start > stop {
            return Err(CctError::InvalidInterval { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// Inclusive start
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive stop
    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }

    /// Length in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        self.stop.timestamp() - self.start.timestamp()
    }

    /// True when the interval covers no whole second
    pub fn is_zero_length(&self) -> bool {
        self.duration_seconds() == 0
    }
}

/// One line item as produced by a cost source
///
/// Records are immutable once built; every field is exposed through a
/// read-only accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCostRecord {
    amount: f64,
    currency: String,
    interval: Interval,
    identity: String,
}

impl RawCostRecord {
    /// Create a new raw record
    pub fn new(
        amount: f64,
        currency: impl Into<String>,
        interval: Interval,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            currency: currency.into(),
            interval,
            identity: identity.into(),
        }
    }

    /// Monetary amount for the whole interval
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// ISO currency code
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Billing interval covered by the amount
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Provider-specific identity (resource path, product code, ...)
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// A calendar day in a reference timezone
///
/// The day's span runs from local midnight of the date to local midnight of
/// the following date, so days around DST transitions are 23 or 25 hours
/// long and consecutive days tile the timeline without gaps.
///
/// # Examples
/// ```
/// use cct_core::types::TargetDay;
/// use chrono::{NaiveDate, TimeZone, Utc};
///
/// let day = TargetDay::utc(NaiveDate::from_ymd_opt(2018, 7, 3).unwrap());
/// assert_eq!(day.start(), Utc.with_ymd_and_hms(2018, 7, 3, 0, 0, 0).unwrap());
/// assert_eq!(day.stop(), Utc.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDay {
    date: NaiveDate,
    tz: Tz,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
}

impl TargetDay {
    /// Create the day for `date` in timezone `tz`
    pub fn new(date: NaiveDate, tz: Tz) -> Self {
        let start = local_midnight(date, &tz);
        let stop = match date.succ_opt() {
            Some(next) => local_midnight(next, &tz),
            None => start + Duration::days(1),
        };
        Self {
            date,
            tz,
            start,
            stop,
        }
    }

    /// Create the day for `date` in UTC
    pub fn utc(date: NaiveDate) -> Self {
        Self::new(date, Tz::UTC)
    }

    /// Truncate a timestamp to its calendar day in `tz`
    pub fn from_timestamp(ts: DateTime<Utc>, tz: &Tz) -> Self {
        Self::new(ts.with_timezone(tz).date_naive(), *tz)
    }

    /// Calendar date
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Reference timezone
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Inclusive span start (local midnight)
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive span stop (next local midnight)
    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }

    /// Instant recorded as the date of allocated records
    pub fn reference_instant(&self) -> DateTime<Utc> {
        self.start
    }

    /// UTC calendar dates the span touches, in order
    ///
    /// Billing data is dated in UTC, so outside UTC a day usually touches
    /// two of them.
    pub fn utc_dates(&self) -> Vec<NaiveDate> {
        let first = self.start.date_naive();
        let last = (self.stop - Duration::seconds(1)).date_naive();
        first.iter_days().take_while(|date| *date <= last).collect()
    }

    /// Whether `instant` falls inside `[start, stop)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.stop
    }

    /// The following calendar day in the same timezone
    pub fn next(&self) -> Option<Self> {
        self.date.succ_opt().map(|date| Self::new(date, self.tz))
    }
}

impl fmt::Display for TargetDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.date.format("%Y-%m-%d"), self.tz.name())
    }
}

/// First instant of `date` in `tz`.
///
/// When midnight is skipped by a DST jump the day starts at the first local
/// time after the gap.
fn local_midnight(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Cost attributed to one calendar day, ready for a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCostRecord {
    cost: f64,
    currency: String,
    date: DateTime<Utc>,
    labels: Labels,
}

impl NormalizedCostRecord {
    /// Create a new normalized record
    pub fn new(
        cost: f64,
        currency: impl Into<String>,
        date: DateTime<Utc>,
        labels: Labels,
    ) -> Self {
        Self {
            cost,
            currency: currency.into(),
            date,
            labels,
        }
    }

    /// Allocated cost
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// ISO currency code
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Reference instant of the day the cost was allocated to
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Label set, including `cloud` and `currency`
    pub fn labels(&self) -> &Labels {
        &self.labels
    }
}
