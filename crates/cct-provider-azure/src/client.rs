//! REST client for the Azure subscription, billing and consumption APIs
//!
//! Requests carry a bearer token obtained outside this tool (for example
//! with `az account get-access-token`). List endpoints are paged; the client
//! follows `nextLink` until the listing is exhausted.

use async_stream::try_stream;
use cct_core::error::{CctError, Result};
use chrono::NaiveDate;
use futures::stream::Stream;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use tracing::debug;
use url::Url;

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API_VERSION: &str = "2016-06-01";
const BILLING_API_VERSION: &str = "2018-03-01-preview";
const CONSUMPTION_API_VERSION: &str = "2018-05-31";
const PAGE_SIZE: &str = "100";

/// One page of a list response
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

/// Subscription as returned by the subscriptions API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Subscription GUID
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Human readable name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Billing period as returned by the billing API
#[derive(Debug, Clone, Deserialize)]
pub struct BillingPeriod {
    /// Resource ID
    #[serde(default)]
    pub id: Option<String>,
    /// Period name, e.g. `201807-1`
    pub name: String,
}

/// Usage detail as returned by the consumption API
#[derive(Debug, Clone, Deserialize)]
pub struct UsageDetail {
    /// Resource ID of the usage detail
    #[serde(default)]
    pub id: Option<String>,
    /// Usage properties, absent on partial responses
    #[serde(default)]
    pub properties: Option<UsageDetailProperties>,
}

/// The fields of a usage detail the tracker reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDetailProperties {
    /// Start of the usage window (RFC 3339)
    #[serde(default)]
    pub usage_start: Option<String>,
    /// End of the usage window (RFC 3339)
    #[serde(default)]
    pub usage_end: Option<String>,
    /// Cost before tax
    #[serde(default)]
    pub pretax_cost: Option<f64>,
    /// Currency code
    #[serde(default)]
    pub currency: Option<String>,
    /// Resource path of the billed instance
    #[serde(default)]
    pub instance_id: Option<String>,
}

/// Paged stream of usage details
pub type UsageDetailStream<'a> = Pin<Box<dyn Stream<Item = Result<UsageDetail>> + Send + 'a>>;

/// Client for the Azure management REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl RestClient {
    /// Create a client for `endpoint` authenticating with a bearer `token`
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self> {
        let normalized = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        let endpoint = Url::parse(&normalized)
            .map_err(|e| CctError::Config(format!("Invalid Azure endpoint '{endpoint}': {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            token: token.into(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| CctError::Config(format!("Invalid Azure request path '{path}': {e}")))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn get_page<T: DeserializeOwned>(&self, url: Url) -> Result<Page<T>> {
        debug!("GET {}", url);
        let response = self.http.get(url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CctError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    fn next_url(next_link: Option<String>) -> Result<Option<Url>> {
        next_link
            .filter(|link| !link.is_empty())
            .map(|link| {
                Url::parse(&link)
                    .map_err(|e| CctError::Config(format!("Invalid nextLink '{link}': {e}")))
            })
            .transpose()
    }

    /// List the IDs of all subscriptions visible to the token
    ///
    /// Subscriptions without an ID are skipped.
    pub async fn subscriptions(&self) -> Result<Vec<String>> {
        let mut next = Some(self.url(
            "subscriptions",
            &[("api-version", SUBSCRIPTIONS_API_VERSION)],
        )?);
        let mut ids = Vec::new();

        while let Some(url) = next {
            let page: Page<Subscription> = self.get_page(url).await?;
            ids.extend(page.value.into_iter().filter_map(|s| s.subscription_id));
            next = Self::next_url(page.next_link)?;
        }

        Ok(ids)
    }

    /// Find the billing period of `subscription` that contains `date`
    ///
    /// Periods ending after `date` are returned newest first, so the first
    /// one listed is the period containing the date.
    pub async fn billing_period(&self, subscription: &str, date: NaiveDate) -> Result<BillingPeriod> {
        let filter = format!("billingPeriodEndDate gt {}", date.format("%Y-%m-%d"));
        let url = self.url(
            &format!("subscriptions/{subscription}/providers/Microsoft.Billing/billingPeriods"),
            &[
                ("api-version", BILLING_API_VERSION),
                ("$filter", filter.as_str()),
                ("$top", PAGE_SIZE),
            ],
        )?;

        let page: Page<BillingPeriod> = self.get_page(url).await?;
        page.value.into_iter().next().ok_or_else(|| {
            CctError::NoBillingPeriod(format!(
                "{} in subscription {subscription}",
                date.format("%Y-%m-%d")
            ))
        })
    }

    /// Stream the usage details of `subscription` that start on `date`
    ///
    /// Pages are fetched lazily as the stream is polled.
    pub fn usage_details(
        &self,
        subscription: &str,
        billing_period: &str,
        date: NaiveDate,
    ) -> UsageDetailStream<'_> {
        let filter = format!("properties/usageStart eq '{}'", date.format("%Y-%m-%d"));
        let path = format!(
            "subscriptions/{subscription}/providers/Microsoft.Billing/billingPeriods/{billing_period}/providers/Microsoft.Consumption/usageDetails"
        );

        Box::pin(try_stream! {
            let mut next = Some(self.url(
                &path,
                &[
                    ("api-version", CONSUMPTION_API_VERSION),
                    ("$filter", filter.as_str()),
                    ("$top", PAGE_SIZE),
                ],
            )?);

            while let Some(url) = next {
                let page: Page<UsageDetail> = self.get_page(url).await?;
                debug!("Received {} usage details", page.value.len());
                for detail in page.value {
                    yield detail;
                }
                next = Self::next_url(page.next_link)?;
            }
        })
    }
}
