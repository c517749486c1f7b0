//! cct - Collect daily cloud costs and store them in InfluxDB
//!
//! This library wires the provider sources, the day allocator and the sinks
//! together:
//! - Read billing line items from Azure usage details or AWS Cost and Usage Reports
//! - Allocate each line item's cost to a calendar day in proportion to overlap
//! - Write the per-day records to InfluxDB, or print them as JSON lines
//!
//! # Examples
//!
//! ```no_run
//! use cct::pipeline::{run_day, target_days};
//! use cct_core::{DayAllocator, RecordFilter};
//! use cct_core::source::CostSource;
//! use cct_core::timezone::TimezoneConfig;
//! use cct_influx::{DbConfig, InfluxSink};
//! use cct_provider_azure::{RestClient, UsageExplorer};
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> cct::Result<()> {
//!     let source = UsageExplorer::new(RestClient::new("https://management.azure.com", "token")?);
//!     let allocator = DayAllocator::new(source.cloud()).with_filter(RecordFilter::skip_empty());
//!     let sink = InfluxSink::new(DbConfig::default())?;
//!
//!     let date = NaiveDate::from_ymd_opt(2018, 7, 3).unwrap();
//!     for day in target_days(date, date, &TimezoneConfig::default()) {
//!         let summary = run_day(&source, &allocator, &sink, &day).await?;
//!         println!("{}: {} records", summary.day, summary.written);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod output;
pub mod pipeline;

// Re-export commonly used types
pub use cct_core::{CctError, Cloud, NormalizedCostRecord, RawCostRecord, Result, TargetDay};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
