//! Common test utilities and helpers for cct tests
//!
//! In-memory sources and sinks so the pipeline can be exercised without
//! any network.

#![allow(dead_code)]

use async_trait::async_trait;
use cct_core::error::{CctError, Result};
use cct_core::source::{CostSink, CostSource, RecordStream};
use cct_core::types::{Cloud, Interval, NormalizedCostRecord, RawCostRecord, TargetDay};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Mutex;

/// Azure resource path used by most tests
pub const AZURE_VM: &str =
    "/subscriptions/sub-1/resourceGroups/group-name/providers/Microsoft.Compute/virtualMachines/vm-1";

/// Azure resource path of a managed disk
pub const AZURE_DISK: &str =
    "/subscriptions/sub-1/resourceGroups/group-name/providers/Microsoft.Compute/disks/disk-1";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn utc_day(y: i32, m: u32, d: u32) -> TargetDay {
    TargetDay::utc(date(y, m, d))
}

/// Builder for creating test RawCostRecord instances
pub struct RawRecordBuilder {
    amount: f64,
    currency: String,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    identity: String,
}

impl RawRecordBuilder {
    /// A 10 SEK record for the Azure VM covering 2018-07-03 (UTC)
    pub fn new() -> Self {
        Self {
            amount: 10.0,
            currency: "SEK".to_string(),
            start: at(2018, 7, 3, 0),
            stop: at(2018, 7, 4, 0),
            identity: AZURE_VM.to_string(),
        }
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_string();
        self
    }

    pub fn window(mut self, start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    pub fn identity(mut self, identity: &str) -> Self {
        self.identity = identity.to_string();
        self
    }

    pub fn build(self) -> RawCostRecord {
        RawCostRecord::new(
            self.amount,
            self.currency,
            Interval::new(self.start, self.stop).unwrap(),
            self.identity,
        )
    }
}

impl Default for RawRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One scripted stream item
#[derive(Debug, Clone)]
pub enum Item {
    Record(RawCostRecord),
    /// Yielded as a record-level error
    Unreadable(String),
}

/// Source replaying the same items for every day
///
/// Days listed in `failing` end with a source-level error instead.
pub struct ScriptedSource {
    cloud: Cloud,
    items: Vec<Item>,
    failing: Vec<NaiveDate>,
}

impl ScriptedSource {
    pub fn new(cloud: Cloud, items: Vec<Item>) -> Self {
        Self {
            cloud,
            items,
            failing: Vec::new(),
        }
    }

    pub fn failing_on(mut self, date: NaiveDate) -> Self {
        self.failing.push(date);
        self
    }
}

impl CostSource for ScriptedSource {
    fn cloud(&self) -> Cloud {
        self.cloud
    }

    fn cost_records(&self, day: &TargetDay) -> RecordStream<'_> {
        let mut items: Vec<Result<RawCostRecord>> = self
            .items
            .iter()
            .map(|item| match item {
                Item::Record(record) => Ok(record.clone()),
                Item::Unreadable(reason) => Err(CctError::InvalidRecord(reason.clone())),
            })
            .collect();
        if self.failing.contains(&day.date()) {
            items.push(Err(CctError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            }));
        }
        Box::pin(futures::stream::iter(items))
    }
}

/// Source selecting records by the UTC date their usage starts on
///
/// Mirrors how the cloud APIs are queried: a day only sees the records
/// dated on one of the UTC dates it touches.
pub struct DatedSource {
    cloud: Cloud,
    records: Vec<RawCostRecord>,
}

impl DatedSource {
    pub fn new(cloud: Cloud, records: Vec<RawCostRecord>) -> Self {
        Self { cloud, records }
    }
}

impl CostSource for DatedSource {
    fn cloud(&self) -> Cloud {
        self.cloud
    }

    fn cost_records(&self, day: &TargetDay) -> RecordStream<'_> {
        let dates = day.utc_dates();
        let selected: Vec<Result<RawCostRecord>> = self
            .records
            .iter()
            .filter(|record| dates.contains(&record.interval().start().date_naive()))
            .cloned()
            .map(Ok)
            .collect();
        Box::pin(futures::stream::iter(selected))
    }
}

/// Sink remembering every batch it receives
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<NormalizedCostRecord>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink rejecting every write
    pub fn failing() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn batches(&self) -> Vec<Vec<NormalizedCostRecord>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CostSink for RecordingSink {
    async fn write(&self, records: &[NormalizedCostRecord]) -> Result<()> {
        if self.fail {
            return Err(CctError::Api {
                status: 500,
                message: "write failed".to_string(),
            });
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}
