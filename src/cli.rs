//! CLI interface for cct
//!
//! Every flag can also be given through an environment variable, so the
//! tracker can run from cron or a container with no arguments besides the
//! cloud.
//!
//! # Example
//!
//! ```bash
//! # Yesterday's Azure costs, all subscriptions
//! AZURE_ACCESS_TOKEN=$(az account get-access-token --query accessToken -o tsv) \
//!     cct --cloud azure
//!
//! # Backfill July 2018 from AWS reports, printing instead of writing
//! cct --cloud aws --aws-bucket my-reports --aws-prefix cur \
//!     --since 2018-07 --until 2018-07 --dry-run
//! ```

use cct_core::error::{CctError, Result};
use cct_core::filters::RecordFilter;
use cct_core::source::CostSource;
use cct_core::timezone::TimezoneConfig;
use cct_core::types::Cloud;
use cct_influx::DbConfig;
use cct_provider_aws::{ReportExplorer, S3Store};
use cct_provider_azure::{RestClient, UsageExplorer};
use chrono::{Duration, Months, NaiveDate};
use clap::{Args, Parser};

/// Collect cloud costs per day and store them in InfluxDB
#[derive(Parser, Debug, Clone)]
#[command(name = "cct")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Cloud provider to collect costs from (azure or aws)
    #[arg(long, env = "CCT_CLOUD")]
    pub cloud: Cloud,

    /// Day to collect (YYYY-MM-DD). Defaults to yesterday
    #[arg(long, env = "CCT_DATE", conflicts_with_all = ["since", "until"])]
    pub date: Option<String>,

    /// First day of a range to collect (YYYY-MM-DD or YYYY-MM)
    #[arg(long, env = "CCT_SINCE")]
    pub since: Option<String>,

    /// Last day of a range to collect (YYYY-MM-DD or YYYY-MM)
    #[arg(long, env = "CCT_UNTIL")]
    pub until: Option<String>,

    /// Timezone deciding where days start (e.g. "Europe/Stockholm"). Defaults to UTC
    #[arg(long, short = 'z', env = "CCT_TIMEZONE")]
    pub timezone: Option<String>,

    /// Use the system's local timezone (ignored when --timezone is given)
    #[arg(long)]
    pub local: bool,

    /// Keep records that do not touch the day or cost nothing
    #[arg(long, env = "CCT_KEEP_EMPTY")]
    pub keep_empty: bool,

    /// Print records as JSON lines instead of writing them to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Only show warnings and errors
    #[arg(long, short = 'q')]
    pub quiet: bool,

    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub azure: AzureArgs,

    #[command(flatten)]
    pub aws: AwsArgs,
}

/// InfluxDB connection arguments
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Database name
    #[arg(long, env = "CCT_DB_NAME", default_value = "cloudCostTracker")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "CCT_DB_USERNAME", default_value = "cctUser")]
    pub db_username: String,

    /// Database password
    #[arg(
        long,
        env = "CCT_DB_PASSWORD",
        default_value = "cctPassword",
        hide_env_values = true
    )]
    pub db_password: String,

    /// Database address
    #[arg(long, env = "CCT_DB_ADDRESS", default_value = "http://localhost:8086")]
    pub db_address: String,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        Self {
            name: args.db_name,
            username: args.db_username,
            password: args.db_password,
            address: args.db_address,
        }
    }
}

/// Azure source arguments
#[derive(Args, Debug, Clone)]
pub struct AzureArgs {
    /// Bearer token for the Azure management API
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub azure_token: Option<String>,

    /// Azure management endpoint
    #[arg(long, env = "CCT_AZURE_ENDPOINT", default_value = cct_provider_azure::client::DEFAULT_ENDPOINT)]
    pub azure_endpoint: String,

    /// Only collect costs of this subscription
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,
}

/// AWS source arguments
#[derive(Args, Debug, Clone)]
pub struct AwsArgs {
    /// Bucket the Cost and Usage Reports are delivered to
    #[arg(long, env = "CCT_AWS_BUCKET")]
    pub aws_bucket: Option<String>,

    /// Report path prefix inside the bucket
    #[arg(long, env = "CCT_AWS_PREFIX", default_value = "")]
    pub aws_prefix: String,

    /// Endpoint serving the bucket. Defaults to https://<bucket>.s3.amazonaws.com
    #[arg(long, env = "CCT_AWS_ENDPOINT")]
    pub aws_endpoint: Option<String>,
}

impl Cli {
    /// Timezone configuration from `--timezone` and `--local`
    pub fn timezone_config(&self) -> Result<TimezoneConfig> {
        TimezoneConfig::from_cli(self.timezone.as_deref(), self.local)
    }

    /// Record filter implied by `--keep-empty`
    pub fn record_filter(&self) -> RecordFilter {
        if self.keep_empty {
            RecordFilter::new()
        } else {
            RecordFilter::skip_empty()
        }
    }

    /// Inclusive range of days to collect, given today's date
    pub fn date_range(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let yesterday = today - Duration::days(1);

        if let Some(date) = &self.date {
            let date = parse_date(date)?;
            return Ok((date, date));
        }

        let until = self
            .until
            .as_deref()
            .map(parse_until_filter)
            .transpose()?;
        let since = self
            .since
            .as_deref()
            .map(parse_date_filter)
            .transpose()?;

        let (since, until) = match (since, until) {
            (Some(since), Some(until)) => (since, until),
            (Some(since), None) => (since, yesterday.max(since)),
            (None, Some(until)) => (until, until),
            (None, None) => (yesterday, yesterday),
        };

        if since > until {
            return Err(CctError::InvalidDate(format!(
                "--since {since} is after --until {until}"
            )));
        }
        Ok((since, until))
    }

    /// Build the cost source for the selected cloud
    pub fn source(&self) -> Result<Box<dyn CostSource>> {
        match self.cloud {
            Cloud::Azure => {
                let token = self.azure.azure_token.as_deref().ok_or_else(|| {
                    CctError::Config(
                        "Azure needs an access token (--azure-token or AZURE_ACCESS_TOKEN)"
                            .to_string(),
                    )
                })?;
                let client = RestClient::new(&self.azure.azure_endpoint, token)?;
                Ok(Box::new(
                    UsageExplorer::new(client).with_subscription(self.azure.subscription.clone()),
                ))
            }
            Cloud::Aws => {
                let store = match (&self.aws.aws_endpoint, &self.aws.aws_bucket) {
                    (Some(endpoint), _) => S3Store::new(endpoint)?,
                    (None, Some(bucket)) => S3Store::for_bucket(bucket)?,
                    (None, None) => {
                        return Err(CctError::Config(
                            "AWS needs a report bucket (--aws-bucket or CCT_AWS_BUCKET)"
                                .to_string(),
                        ));
                    }
                };
                Ok(Box::new(ReportExplorer::new(store, self.aws.aws_prefix.clone())))
            }
        }
    }
}

/// Parse a single day (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
        CctError::InvalidDate(format!(
            "Invalid date format '{date_str}', expected YYYY-MM-DD"
        ))
    })
}

/// Parse the start of a range: YYYY-MM-DD, or YYYY-MM for the first of the month
pub fn parse_date_filter(date_str: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_month(date_str)
}

/// Parse the end of a range: YYYY-MM-DD, or YYYY-MM for the last of the month
pub fn parse_until_filter(date_str: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }
    let first = parse_month(date_str)?;
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| CctError::InvalidDate(format!("Invalid date: {date_str}")))
}

fn parse_month(date_str: &str) -> Result<NaiveDate> {
    let parts: Vec<&str> = date_str.split('-').collect();
    if parts.len() != 2 {
        return Err(CctError::InvalidDate(format!(
            "Invalid date format '{date_str}', expected YYYY-MM-DD or YYYY-MM"
        )));
    }

    let year = parts[0]
        .parse::<i32>()
        .map_err(|_| CctError::InvalidDate(format!("Invalid year in '{date_str}'")))?;
    let month = parts[1]
        .parse::<u32>()
        .map_err(|_| CctError::InvalidDate(format!("Invalid month in '{date_str}'")))?;

    if !(1..=12).contains(&month) {
        return Err(CctError::InvalidDate(format!(
            "Month must be between 1-12, got {month}"
        )));
    }

    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CctError::InvalidDate(format!("Invalid date: {date_str}")))
}
