//! Dry-run output
//!
//! [`JsonLinesSink`] stands in for the database when `--dry-run` is given:
//! each allocated record is printed as one JSON object per line.
//!
//! # Examples
//!
//! ```
//! use cct::output::JsonLinesSink;
//! use cct_core::source::CostSink;
//! use cct_core::types::{Labels, NormalizedCostRecord};
//! use chrono::{TimeZone, Utc};
//!
//! # #[tokio::main]
//! # async fn main() -> cct_core::Result<()> {
//! let sink = JsonLinesSink::new(Vec::new());
//! let record = NormalizedCostRecord::new(
//!     1.5,
//!     "SEK",
//!     Utc.with_ymd_and_hms(2018, 7, 3, 0, 0, 0).unwrap(),
//!     Labels::new(),
//! );
//! sink.write(&[record]).await?;
//!
//! let printed = String::from_utf8(sink.into_inner()).unwrap();
//! assert!(printed.starts_with(r#"{"cost":1.5,"currency":"SEK""#));
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use cct_core::error::Result;
use cct_core::source::CostSink;
use cct_core::types::NormalizedCostRecord;
use std::io::Write;
use tokio::sync::Mutex;

/// Sink printing records as JSON lines
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    /// Sink printing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Sink printing to `out`
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> CostSink for JsonLinesSink<W> {
    async fn write(&self, records: &[NormalizedCostRecord]) -> Result<()> {
        let mut out = self.out.lock().await;
        for record in records {
            serde_json::to_writer(&mut *out, record)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}
