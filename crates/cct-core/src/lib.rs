//! Core types, traits, and allocation logic for cloud-cost-tracker
//!
//! This crate provides the data model, the error type, proportional day
//! allocation, identity parsing, and the source and sink traits used by
//! the provider crates and the `cct` binary.

pub mod allocation;
pub mod error;
pub mod filters;
pub mod identity;
pub mod source;
pub mod timezone;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use allocation::{AllocationReport, DayAllocator, calculate_ratio, overlap_seconds};
pub use error::{CctError, Result};
pub use filters::RecordFilter;
pub use source::{CostSink, CostSource, RecordStream};
pub use types::{Cloud, Interval, Labels, NormalizedCostRecord, RawCostRecord, TargetDay};
