//! Minimal S3 object store client
//!
//! Speaks the two calls the report explorer needs: `ListObjectsV2` and
//! `GetObject`. Requests are unsigned, so the bucket must allow anonymous
//! reads or sit behind a signing proxy reachable at the configured endpoint.

use crate::report::ReportObject;
use cct_core::error::{CctError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<ListedObject>,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
    last_modified: String,
}

/// Client for a single S3 bucket
#[derive(Debug, Clone)]
pub struct S3Store {
    http: reqwest::Client,
    endpoint: Url,
}

impl S3Store {
    /// Create a store for a bucket served at `endpoint`
    ///
    /// Both virtual-hosted (`https://bucket.s3.amazonaws.com`) and path-style
    /// (`http://localhost:9000/bucket`) endpoints work.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| CctError::Config(format!("Invalid S3 endpoint '{endpoint}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(CctError::Config(format!(
                "Invalid S3 endpoint '{endpoint}': not a base URL"
            )));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }

    /// Create a store for `bucket` on the public AWS endpoint
    pub fn for_bucket(bucket: &str) -> Result<Self> {
        Self::new(&format!("https://{bucket}.s3.amazonaws.com"))
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CctError::Config(format!("Invalid S3 endpoint '{}'", self.endpoint)))?
            .pop_if_empty()
            .extend(key.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CctError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// List every object whose key starts with `prefix`
    ///
    /// Follows continuation tokens until the listing is complete. Objects
    /// with an unreadable modification time are left out.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ReportObject>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut url = self.object_url("")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2");
                if !prefix.is_empty() {
                    query.append_pair("prefix", prefix);
                }
                if let Some(token) = &token {
                    query.append_pair("continuation-token", token);
                }
            }

            let body = self.get(url).await?.text().await?;
            let page: ListBucketResult = quick_xml::de::from_str(&body)
                .map_err(|e| CctError::Report(format!("unreadable bucket listing: {e}")))?;
            debug!("Listed {} objects", page.contents.len());

            for listed in page.contents {
                match DateTime::parse_from_rfc3339(&listed.last_modified) {
                    Ok(modified) => objects.push(ReportObject {
                        key: listed.key,
                        last_modified: modified.with_timezone(&Utc),
                    }),
                    Err(e) => warn!(
                        "Skipping object {} with invalid LastModified '{}': {}",
                        listed.key, listed.last_modified, e
                    ),
                }
            }

            match page.next_continuation_token {
                Some(next) if page.is_truncated && !next.is_empty() => token = Some(next),
                _ => break,
            }
        }

        Ok(objects)
    }

    /// Download the object stored under `key`
    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key)?;
        let bytes = self.get(url).await?.bytes().await?;
        debug!("Downloaded {} ({} bytes)", key, bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing(keys: &[(&str, &str)], next: Option<&str>) -> String {
        let contents: String = keys
            .iter()
            .map(|(key, modified)| {
                format!(
                    "<Contents><Key>{key}</Key><LastModified>{modified}</LastModified><Size>10</Size><StorageClass>STANDARD</StorageClass></Contents>"
                )
            })
            .collect();
        let (truncated, token) = match next {
            Some(token) => (
                "true",
                format!("<NextContinuationToken>{token}</NextContinuationToken>"),
            ),
            None => ("false", String::new()),
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>bucket</Name><Prefix>cur</Prefix>{token}<KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys><IsTruncated>{truncated}</IsTruncated>{contents}</ListBucketResult>"#,
            keys.len()
        )
    }

    #[tokio::test]
    async fn test_list_objects_follows_continuation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "cur"))
            .and(query_param_is_missing("continuation-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(
                &[("cur/a.csv.gz", "2018-07-01T10:00:00.000Z")],
                Some("next-token"),
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("continuation-token", "next-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(
                &[
                    ("cur/b.csv.gz", "2018-07-02T10:00:00.000Z"),
                    ("cur/c.csv.gz", "sometime"),
                ],
                None,
            )))
            .mount(&server)
            .await;

        let store = S3Store::new(&server.uri()).unwrap();
        let objects = store.list_objects("cur").await.unwrap();

        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["cur/a.csv.gz", "cur/b.csv.gz"]);
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[], None)))
            .mount(&server)
            .await;

        let store = S3Store::new(&server.uri()).unwrap();
        assert!(store.list_objects("cur").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_object_path_style() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bucket/cur/20180701-20180801/report-1.csv.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let store = S3Store::new(&format!("{}/bucket/", server.uri())).unwrap();
        let bytes = store
            .get_object("cur/20180701-20180801/report-1.csv.gz")
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_access_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("<Error>AccessDenied</Error>"))
            .mount(&server)
            .await;

        let store = S3Store::new(&server.uri()).unwrap();
        let result = store.list_objects("").await;
        assert!(matches!(result, Err(CctError::Api { status: 403, .. })));
    }

    #[test]
    fn test_for_bucket_endpoint() {
        let store = S3Store::for_bucket("my-reports").unwrap();
        let url = store.object_url("cur/x.csv.gz").unwrap();
        assert_eq!(url.as_str(), "https://my-reports.s3.amazonaws.com/cur/x.csv.gz");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(S3Store::new("::nope"), Err(CctError::Config(_))));
    }
}
