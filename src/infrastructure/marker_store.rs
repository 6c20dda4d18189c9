//! # Marker Stores
//!
//! Read access to the web-map plugin's `markers.yml`, either from the local
//! filesystem or through the game panel's file API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::markers::MARKER_SET;
use crate::domain::config::PanelConfig;
use crate::domain::traits::MarkerStore;
use crate::domain::types::{Dimension, Marker};

#[derive(Debug, Deserialize, Default)]
struct MarkerFile {
    #[serde(default)]
    sets: HashMap<String, MarkerSet>,
}

#[derive(Debug, Deserialize, Default)]
struct MarkerSet {
    #[serde(default)]
    markers: BTreeMap<String, MarkerEntry>,
}

#[derive(Debug, Deserialize)]
struct MarkerEntry {
    #[serde(default)]
    label: String,
    #[serde(default)]
    world: String,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    z: f64,
}

/// Markers of `owner` in the player marker set, ordered by id.
pub fn parse_markers(yaml: &str, owner: &str) -> Result<Vec<Marker>> {
    let file: MarkerFile = serde_yaml::from_str(yaml).context("invalid markers file")?;
    let prefix = format!("{owner}_");
    let Some(set) = file.sets.get(MARKER_SET) else {
        return Ok(Vec::new());
    };

    Ok(set
        .markers
        .iter()
        .filter(|(id, _)| id.starts_with(&prefix))
        .map(|(id, entry)| Marker {
            id: id.clone(),
            name: entry.label.trim_matches('"').to_string(),
            dimension: Dimension::from_world(&entry.world).unwrap_or(Dimension::Overworld),
            x: entry.x,
            z: entry.z,
        })
        .collect())
}

pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn list(&self, owner: &str) -> Result<Vec<Marker>> {
        let yaml = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        parse_markers(&yaml, owner)
    }
}

/// Reads the marker file through the panel's client API.
pub struct PanelMarkerStore {
    client: Client,
    config: PanelConfig,
}

impl PanelMarkerStore {
    pub fn new(config: PanelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, config })
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/api/client/servers/{}/files/contents",
            self.config.base_url.trim_end_matches('/'),
            self.config.server_id
        )
    }
}

#[async_trait]
impl MarkerStore for PanelMarkerStore {
    async fn list(&self, owner: &str) -> Result<Vec<Marker>> {
        let yaml = self
            .client
            .get(self.contents_url())
            .query(&[("file", self.config.file.as_str())])
            .bearer_auth(&self.config.api_key)
            .header("Accept", "Application/vnd.pterodactyl.v1+json")
            .send()
            .await
            .context("Panel request failed")?
            .error_for_status()
            .context("Panel refused to read the markers file")?
            .text()
            .await?;
        parse_markers(&yaml, owner)
    }
}
