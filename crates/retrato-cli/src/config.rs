// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "retrato";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_LOOKUP_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_LOOKUP_TIMEOUT: &str = "5s";
const DEFAULT_DEBOUNCE: &str = "500ms";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub lookup: Lookup,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub item: Item,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            lookup: Lookup::default(),
            ui: Ui::default(),
            item: Item::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Lookup {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Lookup {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_LOOKUP_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_LOOKUP_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub debounce: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            debounce: Some(DEFAULT_DEBOUNCE.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Item {
    pub data_path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("RETRATO_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set RETRATO_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and move values under [lookup], [ui], and [item]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.lookup.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "lookup.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(debounce) = &self.ui.debounce {
            let parsed = parse_duration(debounce)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "ui.debounce in {} must be positive, got {}",
                    path.display(),
                    debounce
                );
            }
        }

        Ok(())
    }

    pub fn lookup_base_url(&self) -> &str {
        self.lookup
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_LOOKUP_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn lookup_timeout(&self) -> Result<Duration> {
        parse_duration(self.lookup.timeout.as_deref().unwrap_or(DEFAULT_LOOKUP_TIMEOUT))
    }

    pub fn debounce(&self) -> Result<Duration> {
        parse_duration(self.ui.debounce.as_deref().unwrap_or(DEFAULT_DEBOUNCE))
    }

    pub fn item_data_path(&self) -> Option<PathBuf> {
        self.item.data_path.as_deref().map(PathBuf::from)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# retrato config\n# Place this file at: {}\n\nversion = 1\n\n[lookup]\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[ui]\n# Quiet window before a search-box value is looked up\ndebounce = \"{}\"\n\n[item]\n# Optional. JSON file with the item data (existing depicts, people, props, catalog)\n# data_path = \"/absolute/path/to/item.json\"\n",
            path.display(),
            DEFAULT_LOOKUP_BASE_URL,
            DEFAULT_LOOKUP_TIMEOUT,
            DEFAULT_DEBOUNCE,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
