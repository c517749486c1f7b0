//! HTTP writer for InfluxDB

use crate::line_protocol::to_line;
use async_trait::async_trait;
use cct_core::error::{CctError, Result};
use cct_core::source::CostSink;
use cct_core::types::NormalizedCostRecord;
use tracing::{debug, info, warn};
use url::Url;

/// Lines sent per write request
pub const BATCH_SIZE: usize = 5000;

/// Connection settings for the InfluxDB database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Database name
    pub name: String,
    /// User name for basic auth
    pub username: String,
    /// Password for basic auth
    pub password: String,
    /// Base address, e.g. `http://localhost:8086`
    pub address: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            name: "cloudCostTracker".to_string(),
            username: "cctUser".to_string(),
            password: "cctPassword".to_string(),
            address: "http://localhost:8086".to_string(),
        }
    }
}

/// Sink writing cost points to InfluxDB
#[derive(Debug, Clone)]
pub struct InfluxSink {
    http: reqwest::Client,
    config: DbConfig,
    base: Url,
}

impl InfluxSink {
    /// Create a sink for the database described by `config`
    pub fn new(config: DbConfig) -> Result<Self> {
        let base = Url::parse(&config.address).map_err(|e| {
            CctError::Config(format!("Invalid database address '{}': {e}", config.address))
        })?;
        if base.cannot_be_a_base() {
            return Err(CctError::Config(format!(
                "Invalid database address '{}'",
                config.address
            )));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            config,
            base,
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CctError::Config(format!("Invalid database address '{}'", self.base)))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(CctError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Check that the database answers
    pub async fn ping(&self) -> Result<()> {
        let url = self.endpoint("ping")?;
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        Self::check(response).await
    }
}

#[async_trait]
impl CostSink for InfluxSink {
    async fn write(&self, records: &[NormalizedCostRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut lines = Vec::with_capacity(records.len());
        for record in records {
            match to_line(record) {
                Ok(line) => lines.push(line),
                Err(e) => warn!("Skipping point: {}", e),
            }
        }
        if lines.len() < records.len() {
            warn!(
                "Skipped {} of {} points that cannot be stored",
                records.len() - lines.len(),
                records.len()
            );
        }
        if lines.is_empty() {
            return Ok(());
        }

        let mut url = self.endpoint("write")?;
        url.query_pairs_mut()
            .append_pair("db", &self.config.name)
            .append_pair("precision", "h");

        for (batch, chunk) in lines.chunks(BATCH_SIZE).enumerate() {
            debug!("Writing batch {} ({} points)", batch + 1, chunk.len());
            let response = self
                .http
                .post(url.clone())
                .basic_auth(&self.config.username, Some(&self.config.password))
                .body(chunk.join("\n"))
                .send()
                .await?;
            Self::check(response).await?;
        }

        info!("Wrote {} points to {}", lines.len(), self.config.name);
        Ok(())
    }
}
