use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{header, Client};
use serde::Deserialize;

/// Something that can tell us what time the shared reference clock reads.
#[async_trait]
pub trait ReferenceTimeSource: Send + Sync {
    /// One request/response round. Retries are the caller's business.
    async fn fetch_reference_ms(&self) -> Result<i64>;
}

#[derive(Debug, Deserialize)]
struct TimeResponse {
    utc_datetime: Option<String>,
    unixtime: Option<i64>,
}

/// Reference time over HTTP from a worldtimeapi-style JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    client: Client,
    url: String,
}

impl HttpTimeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reference time HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReferenceTimeSource for HttpTimeSource {
    async fn fetch_reference_ms(&self) -> Result<i64> {
        // Cache buster, so an intermediary never hands back a stale timestamp.
        let nonce = chrono::Utc::now().timestamp_millis().to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("_", nonce.as_str())])
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.url))?;

        let body: TimeResponse = response
            .json()
            .await
            .context("reference time response was not valid JSON")?;
        reference_ms_from_response(&body)
    }
}

fn reference_ms_from_response(body: &TimeResponse) -> Result<i64> {
    if let Some(raw) = body.utc_datetime.as_deref() {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.timestamp_millis());
        }
    }

    body.unixtime
        .map(|secs| secs.saturating_mul(1000))
        .ok_or_else(|| anyhow!("reference time response carried no usable timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<i64> {
        let body: TimeResponse = serde_json::from_str(json).unwrap();
        reference_ms_from_response(&body)
    }

    #[test]
    fn prefers_utc_datetime_with_millis() {
        let ms = parse(
            r#"{"utc_datetime":"2024-03-01T12:00:00.250+00:00","unixtime":1709294400}"#,
        )
        .unwrap();
        assert_eq!(ms, 1_709_294_400_250);
    }

    #[test]
    fn falls_back_to_unixtime() {
        let ms = parse(r#"{"utc_datetime":"not a date","unixtime":1709294400}"#).unwrap();
        assert_eq!(ms, 1_709_294_400_000);

        let ms = parse(r#"{"unixtime":10}"#).unwrap();
        assert_eq!(ms, 10_000);
    }

    #[test]
    fn rejects_empty_response() {
        assert!(parse("{}").is_err());
    }
}
