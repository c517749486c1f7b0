//! Timezone utilities for day allocation
//!
//! Billing data is stamped in UTC, so UTC is the default reference timezone.
//! A named timezone or the system's local timezone can be chosen instead;
//! it decides where each calendar day starts and ends.

use crate::error::{CctError, Result};
use crate::types::TargetDay;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use tracing::debug;

/// Configuration for timezone handling
#[derive(Debug, Clone)]
pub struct TimezoneConfig {
    /// The timezone days are allocated in
    pub tz: Tz,
    /// Whether the timezone is UTC
    pub is_utc: bool,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            is_utc: true,
        }
    }
}

impl TimezoneConfig {
    /// Create a new timezone configuration from CLI arguments
    ///
    /// An explicit timezone name wins over `use_local`; with neither, UTC is used.
    pub fn from_cli(timezone_str: Option<&str>, use_local: bool) -> Result<Self> {
        let tz = match timezone_str {
            Some(tz_str) => Tz::from_str(tz_str).map_err(|_| {
                CctError::InvalidTimezone(format!(
                    "'{}'. Use format like 'Europe/Stockholm', 'America/New_York', or 'UTC'",
                    tz_str
                ))
            })?,
            None if use_local => get_local_timezone(),
            None => Tz::UTC,
        };

        Ok(Self {
            tz,
            is_utc: tz == Tz::UTC,
        })
    }

    /// Get the display name for the configured timezone
    pub fn display_name(&self) -> &str {
        if self.is_utc { "UTC" } else { self.tz.name() }
    }

    /// Today's date in the configured timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Build the target day for `date` in the configured timezone
    pub fn day(&self, date: NaiveDate) -> TargetDay {
        TargetDay::new(date, self.tz)
    }
}

/// Detect the system's local timezone
///
/// `TZ` wins when it names a known zone; otherwise the zone reported by the
/// operating system is used. Detection failures fall back to UTC.
pub fn get_local_timezone() -> Tz {
    if let Some(tz) = env::var("TZ").ok().and_then(|name| Tz::from_str(&name).ok()) {
        debug!("Local timezone {} taken from TZ", tz.name());
        return tz;
    }

    let detected = iana_time_zone::get_timezone()
        .map_err(|e| e.to_string())
        .and_then(|name| Tz::from_str(&name).map_err(|_| format!("unknown zone '{name}'")));
    match detected {
        Ok(tz) => {
            debug!("Local timezone {} reported by the system", tz.name());
            tz
        }
        Err(reason) => {
            debug!("No usable local timezone ({}), using UTC", reason);
            Tz::UTC
        }
    }
}
