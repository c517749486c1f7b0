//! Cost and Usage Report selection and parsing
//!
//! AWS writes one report per billing month under a path containing the
//! month's range, e.g. `.../20180701-20180801/...-1.csv.gz`, and rewrites it
//! several times while the month is open. The newest object for the range
//! wins. Reports are gzip CSV files with a header row; the columns read here
//! are located by name.

use cct_core::error::{CctError, Result};
use cct_core::types::{Interval, RawCostRecord};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use csv::{StringRecord, StringRecordsIntoIter};
use flate2::read::GzDecoder;
use std::io::Read;

/// Start of the usage window
pub const USAGE_START_COLUMN: &str = "lineItem/UsageStartDate";
/// End of the usage window
pub const USAGE_END_COLUMN: &str = "lineItem/UsageEndDate";
/// Billed service
pub const PRODUCT_CODE_COLUMN: &str = "lineItem/ProductCode";
/// Currency of the cost
pub const CURRENCY_COLUMN: &str = "lineItem/CurrencyCode";
/// Blended cost of the line item
pub const BLENDED_COST_COLUMN: &str = "lineItem/BlendedCost";

/// An object in the report bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportObject {
    /// Object key
    pub key: String,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
}

/// Billing range of the month containing `date`, formatted `YYYYMMDD-YYYYMMDD`
///
/// # Examples
/// ```
/// use cct_provider_aws::report::billing_range;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2018, 7, 15).unwrap();
/// assert_eq!(billing_range(date).unwrap(), "20180701-20180801");
/// ```
pub fn billing_range(date: NaiveDate) -> Result<String> {
    let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .ok_or_else(|| CctError::InvalidDate(format!("No first day of month for {date}")))?;
    let stop = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| CctError::InvalidDate(format!("No month after {date}")))?;

    Ok(format!(
        "{}-{}",
        start.format("%Y%m%d"),
        stop.format("%Y%m%d")
    ))
}

/// Whether `key` is a compressed report for `range`
pub fn key_is_valid(key: &str, range: &str) -> bool {
    key.contains(range) && key.contains("csv.gz")
}

/// Pick the most recently modified report for `range`
pub fn select_report_key<'a>(objects: &'a [ReportObject], range: &str) -> Option<&'a ReportObject> {
    objects
        .iter()
        .filter(|object| key_is_valid(&object.key, range))
        .max_by_key(|object| object.last_modified)
}

/// Positions of the columns the tracker reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReportColumns {
    start: usize,
    stop: usize,
    service: usize,
    currency: usize,
    cost: usize,
}

impl ReportColumns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or_else(|| CctError::Report(format!("missing column '{name}'")))
        };

        Ok(Self {
            start: position(USAGE_START_COLUMN)?,
            stop: position(USAGE_END_COLUMN)?,
            service: position(PRODUCT_CODE_COLUMN)?,
            currency: position(CURRENCY_COLUMN)?,
            cost: position(BLENDED_COST_COLUMN)?,
        })
    }

    fn parse(&self, row: &StringRecord) -> Result<RawCostRecord> {
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let field = |index: usize, name: &str| {
            row.get(index)
                .map(str::trim)
                .ok_or_else(|| CctError::InvalidRecord(format!("line {line}: missing {name}")))
        };
        let timestamp = |index: usize, name: &str| {
            let value = field(index, name)?;
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    CctError::InvalidRecord(format!("line {line}: invalid {name} '{value}': {e}"))
                })
        };

        let start = timestamp(self.start, USAGE_START_COLUMN)?;
        let stop = timestamp(self.stop, USAGE_END_COLUMN)?;
        let cost_str = field(self.cost, BLENDED_COST_COLUMN)?;
        let cost = cost_str
            .parse::<f64>()
            .ok()
            .filter(|cost| cost.is_finite())
            .ok_or_else(|| {
                CctError::InvalidRecord(format!("line {line}: invalid cost '{cost_str}'"))
            })?;

        Ok(RawCostRecord::new(
            cost,
            field(self.currency, CURRENCY_COLUMN)?,
            Interval::new(start, stop)?,
            field(self.service, PRODUCT_CODE_COLUMN)?,
        ))
    }
}

/// Iterator over the line items of a report
///
/// A row that cannot be parsed yields an `InvalidRecord` error and iteration
/// continues with the next row. When the underlying stream fails (a
/// truncated or corrupt gzip body) a single `Report` error is yielded and
/// iteration ends, since the remaining rows are lost.
pub struct ReportReader<R: Read> {
    rows: StringRecordsIntoIter<R>,
    columns: ReportColumns,
    done: bool,
}

impl<R: Read> ReportReader<GzDecoder<R>> {
    /// Read a gzip-compressed report
    pub fn from_gzip(compressed: R) -> Result<Self> {
        ReportReader::from_csv(GzDecoder::new(compressed))
    }
}

impl<R: Read> ReportReader<R> {
    /// Read an uncompressed report
    pub fn from_csv(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = csv_reader
            .headers()
            .map_err(|e| CctError::Report(format!("unreadable header: {e}")))?;
        let columns = ReportColumns::from_headers(headers)?;

        Ok(Self {
            rows: csv_reader.into_records(),
            columns,
            done: false,
        })
    }

    fn row_error(&mut self, error: csv::Error) -> CctError {
        match error.kind() {
            csv::ErrorKind::Utf8 { .. }
            | csv::ErrorKind::UnequalLengths { .. }
            | csv::ErrorKind::Deserialize { .. } => {
                CctError::InvalidRecord(format!("unreadable row: {error}"))
            }
            _ => {
                self.done = true;
                CctError::Report(format!("report stream failed: {error}"))
            }
        }
    }
}

impl<R: Read> Iterator for ReportReader<R> {
    type Item = Result<RawCostRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rows.next()? {
            Ok(row) => Some(self.columns.parse(&row)),
            Err(e) => Some(Err(self.row_error(e))),
        }
    }
}
