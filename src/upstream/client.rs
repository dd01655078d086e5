use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use super::{models::decode_batch, ObservationBatch, ObservationSource};
use crate::{occupancy::Zone, settings::UpstreamSettings};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// HTTP client for the WiFi presence analytics API.
#[derive(Clone)]
pub struct PresenceClient {
    http: reqwest::Client,
    host: String,
}

impl PresenceClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !settings.auth.is_empty() {
            let mut value = HeaderValue::from_str(&settings.auth)
                .map_err(|err| anyhow!("upstream auth is not a valid header value: {err}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if settings.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(settings.request_timeout_secs));
        }
        let http = builder
            .build()
            .context("failed to build presence API client")?;

        Ok(Self {
            http,
            host: settings.host.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, zone: &Zone) -> String {
        if zone.path.starts_with('/') {
            format!("{}{}", self.host, zone.path)
        } else {
            format!("{}/{}", self.host, zone.path)
        }
    }
}

#[async_trait]
impl ObservationSource for PresenceClient {
    async fn fetch_zone(&self, zone: &Zone) -> Result<ObservationBatch> {
        let url = self.url_for(zone);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", zone.display_name))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", zone.display_name, status);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("{} returned an unreadable body", zone.display_name))?;
        let batch = decode_batch(body)
            .with_context(|| format!("{} returned an unexpected payload", zone.display_name))?;

        log_info!(
            "Device Connected in {}: {}",
            zone.display_name,
            batch.observations.len()
        );
        if batch.malformed > 0 {
            log_warn!(
                "{}: dropped {} malformed device records",
                zone.display_name,
                batch.malformed
            );
        }
        Ok(batch)
    }
}
