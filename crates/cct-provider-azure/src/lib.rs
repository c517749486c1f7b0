//! Azure provider for cloud-cost-tracker
//!
//! This crate implements the cost source for Azure, reading usage details
//! for each subscription from the consumption REST API.

pub mod client;
pub mod usage;

pub use client::RestClient;
pub use usage::UsageExplorer;
