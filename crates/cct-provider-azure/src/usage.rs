//! Azure usage explorer
//!
//! Walks every subscription (or a single configured one) and, for each UTC
//! date the target day touches, finds the billing period containing that
//! date and turns its usage details into raw cost records.

use crate::client::{RestClient, UsageDetail};
use async_stream::stream;
use cct_core::error::{CctError, Result};
use cct_core::identity::provider_of;
use cct_core::source::{CostSource, RecordStream};
use cct_core::types::{Cloud, Interval, RawCostRecord, TargetDay};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Cost source reading Azure usage details
#[derive(Debug, Clone)]
pub struct UsageExplorer {
    client: RestClient,
    subscription: Option<String>,
}

impl UsageExplorer {
    /// Create an explorer that visits every subscription visible to the client
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            subscription: None,
        }
    }

    /// Restrict the explorer to one subscription
    pub fn with_subscription(mut self, subscription: Option<String>) -> Self {
        self.subscription = subscription;
        self
    }

    async fn subscriptions(&self) -> Result<Vec<String>> {
        match &self.subscription {
            Some(subscription) => Ok(vec![subscription.clone()]),
            None => self.client.subscriptions().await,
        }
    }
}

impl CostSource for UsageExplorer {
    fn cloud(&self) -> Cloud {
        Cloud::Azure
    }

    fn cost_records(&self, day: &TargetDay) -> RecordStream<'_> {
        // Usage details are dated in UTC; a day outside UTC spans two dates.
        let dates = day.utc_dates();
        let day = *day;

        Box::pin(stream! {
            info!("azure: Getting cost for {}", day);

            let subscriptions = match self.subscriptions().await {
                Ok(subscriptions) => subscriptions,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for subscription in subscriptions {
                let mut totals: BTreeMap<String, f64> = BTreeMap::new();

                for date in &dates {
                    let period = match self.client.billing_period(&subscription, *date).await {
                        Ok(period) => period,
                        Err(e) => {
                            warn!("Unable to get billing period for subscription {}: {}", subscription, e);
                            yield Err(e);
                            return;
                        }
                    };
                    debug!("Getting usage of {} in billing period {}", date, period.name);

                    let mut details = self.client.usage_details(&subscription, &period.name, *date);

                    while let Some(detail) = details.next().await {
                        let detail = match detail {
                            Ok(detail) => detail,
                            Err(e) => {
                                warn!("Unable to get cost for subscription {}: {}", subscription, e);
                                yield Err(e);
                                return;
                            }
                        };

                        match to_raw_record(detail) {
                            Ok(Some(record)) => {
                                if let Ok(provider) = provider_of(record.identity()) {
                                    *totals.entry(provider).or_insert(0.0) += record.amount();
                                }
                                yield Ok(record);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                yield Err(e);
                            }
                        }
                    }
                }

                for (provider, total) in &totals {
                    debug!("{}: {} {:.4}", subscription, provider, total);
                }
            }
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CctError::InvalidRecord(format!("invalid timestamp '{value}': {e}")))
}

/// Convert a usage detail into a raw record
///
/// Details missing any required property are skipped (`Ok(None)`); present
/// but unreadable properties are errors.
fn to_raw_record(detail: UsageDetail) -> Result<Option<RawCostRecord>> {
    let id = detail.id.unwrap_or_default();
    let Some(properties) = detail.properties else {
        warn!("Skipping usage detail {} without properties", id);
        return Ok(None);
    };

    let (Some(usage_start), Some(pretax_cost), Some(currency), Some(instance_id)) = (
        properties.usage_start,
        properties.pretax_cost,
        properties.currency,
        properties.instance_id,
    ) else {
        warn!("Skipping usage detail {} with missing properties", id);
        return Ok(None);
    };

    let start = parse_timestamp(&usage_start)?;
    let stop = match properties.usage_end.as_deref() {
        Some(usage_end) => parse_timestamp(usage_end)?,
        None => start + Duration::days(1),
    };
    let interval = Interval::new(start, stop)?;

    debug!(
        "{} {}, {}, {}",
        pretax_cost,
        currency,
        start.format("%Y-%m-%d %H:%M"),
        instance_id
    );

    Ok(Some(RawCostRecord::new(
        pretax_cost,
        currency,
        interval,
        instance_id,
    )))
}
