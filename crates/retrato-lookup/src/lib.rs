// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use retrato_app::{Hit, ImageInfo};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Blocking client for the lookup service: entity search plus the
/// per-property image lookups. One instance is shared by every search box;
/// it is cheap to clone for worker threads.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("lookup.base_url must not be empty");
        }
        Url::parse(&base_url)
            .with_context(|| format!("lookup.base_url {base_url:?} is not a valid URL"))?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET {base}/lookup?terms=<terms>` -> the `hits` list. The terms are
    /// URL-encoded by the query serializer, matching the original page's
    /// `encodeURI` call.
    pub fn search(&self, terms: &str) -> Result<Vec<Hit>> {
        let mut url = Url::parse(&format!("{}/lookup", self.base_url))
            .context("assemble lookup URL")?;
        url.query_pairs_mut().append_pair("terms", terms);

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: LookupResponse = response.json().context("decode lookup response")?;
        Ok(parsed.hits)
    }

    /// Fetch one property's image list. `lookup_url` may be absolute or a
    /// path relative to the service base, as the page-injected data carries
    /// both forms.
    pub fn item_images(&self, lookup_url: &str) -> Result<Vec<ImageInfo>> {
        let base = Url::parse(&format!("{}/", self.base_url)).context("parse base URL")?;
        let url = base
            .join(lookup_url)
            .with_context(|| format!("resolve image lookup URL {lookup_url:?}"))?;

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let parsed: ImagesResponse = response.json().context("decode image response")?;
        Ok(parsed.items)
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach lookup service at {base_url} ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(error) = parsed.error
        && !error.is_empty()
    {
        return anyhow!("lookup service error ({}): {}", status.as_u16(), error);
    }

    if body.len() < 100 && !body.contains('{') {
        return anyhow!("lookup service error ({}): {}", status.as_u16(), body);
    }

    anyhow!("lookup service returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    items: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}
