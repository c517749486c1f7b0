//! InfluxDB line protocol encoding

use cct_core::error::{CctError, Result};
use cct_core::types::NormalizedCostRecord;
use std::fmt::Write;

/// Measurement every record is written to
pub const MEASUREMENT: &str = "cost";

const SECONDS_PER_HOUR: i64 = 3600;

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Encode one record as a line
///
/// Labels become tags (empty values are dropped since InfluxDB rejects
/// them), the cost becomes the single `cost` field and the timestamp is the
/// record date in whole hours since the epoch, rounded up so that days
/// starting on a half-hour offset keep their point inside the day.
///
/// Non-finite costs cannot be represented and are rejected.
pub fn to_line(record: &NormalizedCostRecord) -> Result<String> {
    let cost = record.cost();
    if !cost.is_finite() {
        return Err(CctError::InvalidRecord(format!(
            "cost {cost} of {} record on {} is not a finite number",
            record.currency(),
            record.date()
        )));
    }

    let mut line = String::from(MEASUREMENT);
    for (key, value) in record.labels() {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        line.push(',');
        escape_into(&mut line, key);
        line.push('=');
        escape_into(&mut line, value);
    }

    let hours = (record.date().timestamp() + SECONDS_PER_HOUR - 1).div_euclid(SECONDS_PER_HOUR);
    // Debug formatting keeps a decimal point so the field stays a float.
    let _ = write!(line, " cost={cost:?} {hours}");
    Ok(line)
}
