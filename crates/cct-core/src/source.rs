//! Cost source and sink traits
//!
//! Provider crates implement [`CostSource`]; the database writer and the
//! dry-run printer implement [`CostSink`]. The pipeline in the binary only
//! talks to these traits.

use crate::error::Result;
use crate::types::{Cloud, NormalizedCostRecord, RawCostRecord, TargetDay};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Lazy, finite stream of raw records for one day
pub type RecordStream<'a> = Pin<Box<dyn Stream<Item = Result<RawCostRecord>> + Send + 'a>>;

/// Trait for provider-specific usage sources.
///
/// A source yields the line items relevant to a target day. Record-level
/// errors (see [`crate::CctError::is_record_level`]) are yielded in place of
/// the offending item and the stream continues; any other error is the last
/// item of the stream.
pub trait CostSource: Send + Sync {
    /// Cloud the records come from
    fn cloud(&self) -> Cloud;

    /// Stream the line items covering `day`
    fn cost_records(&self, day: &TargetDay) -> RecordStream<'_>;
}

/// Trait for destinations of normalized records.
#[async_trait]
pub trait CostSink: Send + Sync {
    /// Persist a batch of records
    ///
    /// Records already flushed before a failure are not rolled back.
    async fn write(&self, records: &[NormalizedCostRecord]) -> Result<()>;
}
