// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One search result from the lookup endpoint. The endpoint's schema is not
/// fully controlled by this client, so unknown fields are preserved in
/// `extra` instead of being dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub qid: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Hit {
    pub fn new(qid: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            qid: qid.into(),
            label: label.into(),
            description: None,
            count: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A person known to be connected to the item, supplied with the page data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub qid: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One image record from a property's image-lookup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            width: None,
            height: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Fetch state of a property's image attachment. Every card starts
/// `Pending`; the fetch fires once at view initialization and resolves to
/// `Loaded` or `Failed` independently of the other cards.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImageFetch {
    #[default]
    Pending,
    Loaded(Vec<ImageInfo>),
    Failed(String),
}

impl ImageFetch {
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A related property with its image-lookup URL. `images` is not part of
/// the injected data; it is attached in place when the fetch resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropCard {
    pub pid: String,
    pub label: String,
    pub image_lookup: String,
    #[serde(skip)]
    pub images: ImageFetch,
}

/// One row of the catalog view. Each entry owns a search box keyed by its
/// QID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub qid: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// The data a server would inject into the page before script execution:
/// the item under edit, its existing depicts, related people, the property
/// cards for the eager image fetch, and the catalog rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemContext {
    pub qid: String,
    pub label: String,
    #[serde(default)]
    pub existing_depicts: Vec<Hit>,
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub other_props: Vec<PropCard>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

impl ItemContext {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("decode item context")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("encode item context")
    }
}
