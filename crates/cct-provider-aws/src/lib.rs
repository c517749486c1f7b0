//! AWS provider for cloud-cost-tracker
//!
//! This crate implements the cost source for AWS, reading the gzip CSV
//! Cost and Usage Reports that AWS delivers to an S3 bucket.

pub mod report;
pub mod source;
pub mod store;

pub use source::ReportExplorer;
pub use store::S3Store;
