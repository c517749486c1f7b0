//! InfluxDB sink for cloud-cost-tracker
//!
//! Normalized cost records are written as points of the `cost` measurement
//! using the InfluxDB 1.x HTTP write API with hour precision.

pub mod line_protocol;
pub mod sink;

pub use sink::{DbConfig, InfluxSink};
