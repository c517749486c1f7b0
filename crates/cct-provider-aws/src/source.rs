//! AWS report explorer

use crate::report::{ReportReader, billing_range, select_report_key};
use crate::store::S3Store;
use async_stream::stream;
use cct_core::error::CctError;
use cct_core::source::{CostSource, RecordStream};
use cct_core::types::{Cloud, TargetDay};
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Cost source reading the newest Cost and Usage Report of each month the target day touches
#[derive(Debug, Clone)]
pub struct ReportExplorer {
    store: S3Store,
    prefix: String,
}

impl ReportExplorer {
    /// Explore reports stored under `prefix` in `store`
    pub fn new(store: S3Store, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }
}

impl CostSource for ReportExplorer {
    fn cloud(&self) -> Cloud {
        Cloud::Aws
    }

    fn cost_records(&self, day: &TargetDay) -> RecordStream<'_> {
        let day = *day;

        Box::pin(stream! {
            info!("aws: Getting cost for {}", day);

            // Reports are split by UTC billing month; a day outside UTC can
            // straddle two of them.
            let mut ranges: Vec<String> = Vec::new();
            for date in day.utc_dates() {
                match billing_range(date) {
                    Ok(range) if !ranges.contains(&range) => ranges.push(range),
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            let objects = match self.store.list_objects(&self.prefix).await {
                Ok(objects) => objects,
                Err(e) => {
                    warn!("Unable to list reports under '{}': {}", self.prefix, e);
                    yield Err(e);
                    return;
                }
            };

            for range in &ranges {
                let key = match select_report_key(&objects, range) {
                    Some(object) => object.key.clone(),
                    None => {
                        yield Err(CctError::NoReport(format!(
                            "billing range {} under '{}'",
                            range, self.prefix
                        )));
                        return;
                    }
                };
                debug!("Using report {}", key);

                let body = match self.store.get_object(&key).await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("Unable to download report {}: {}", key, e);
                        yield Err(e);
                        return;
                    }
                };
                let reader = match ReportReader::from_gzip(Cursor::new(body)) {
                    Ok(reader) => reader,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                for row in reader {
                    let failed = matches!(row, Err(ref e) if !e.is_record_level());
                    yield row;
                    if failed {
                        return;
                    }
                }
            }
        })
    }
}
