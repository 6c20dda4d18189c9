//! # Map Markers
//!
//! Player owned web-map markers, created and deleted through console
//! `dmarker` commands and read back from the map plugin's marker store.
//!
//! Marker ids are `<owner>_<nanos>` where `<owner>` is the hex encoded user id.
//! The key never contains `_`, so ownership is an exact prefix check.

use anyhow::Result;
use regex::Regex;
use std::fmt::Write;
use std::sync::{Arc, LazyLock};

use crate::domain::traits::{ConsoleTransport, MarkerStore};
use crate::domain::types::{Dimension, Marker};

/// Marker set every player marker lives in.
pub const MARKER_SET: &str = "Bases";

static REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(overworld|nether|end)\s+(-?\d+)\s+(-?\d+)\s+(.+)$").expect("valid marker pattern")
});

/// Id prefix owned by a chat user: the lowercase hex of its UTF-8 bytes.
pub fn owner_key(author_id: &str) -> String {
    author_id.bytes().fold(String::with_capacity(author_id.len() * 2), |mut key, b| {
        let _ = write!(key, "{b:02x}");
        key
    })
}

/// Parses `<overworld|nether|end> <X> <Z> <name>`.
pub fn parse_request(owner: &str, args: &str, nonce: i64) -> Option<Marker> {
    let caps = REQUEST.captures(args.trim())?;
    let name = caps[4].replace('"', "");
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Marker {
        id: format!("{}_{}", owner, nonce),
        name: name.to_string(),
        dimension: Dimension::from_alias(&caps[1])?,
        x: caps[2].parse().ok()?,
        z: caps[3].parse().ok()?,
    })
}

pub fn add_command(marker: &Marker) -> String {
    format!(
        r#"dmarker add "{}" id:{} world:{} x:{} y:64 z:{} set:{} markup:true"#,
        marker.name,
        marker.id,
        marker.dimension.world(),
        marker.x,
        marker.z,
        MARKER_SET
    )
}

pub fn remove_command(marker: &Marker) -> String {
    format!("dmarker delete id:{} set:{}", marker.id, MARKER_SET)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(Marker),
    Malformed,
    LimitReached(usize),
    /// The console answered without confirming; carries its output.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    Removed,
    Unknown,
    Rejected(String),
}

pub struct MarkerService {
    console: Arc<dyn ConsoleTransport>,
    store: Arc<dyn MarkerStore>,
    max_per_player: usize,
}

impl MarkerService {
    pub fn new(
        console: Arc<dyn ConsoleTransport>,
        store: Arc<dyn MarkerStore>,
        max_per_player: usize,
    ) -> Self {
        Self {
            console,
            store,
            max_per_player,
        }
    }

    pub async fn list(&self, author_id: &str) -> Result<Vec<Marker>> {
        self.store.list(&owner_key(author_id)).await
    }

    pub async fn add(&self, author_id: &str, args: &str) -> Result<AddOutcome> {
        let nonce = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
        let Some(marker) = parse_request(&owner_key(author_id), args, nonce) else {
            return Ok(AddOutcome::Malformed);
        };

        let existing = self.list(author_id).await?;
        if existing.len() >= self.max_per_player {
            return Ok(AddOutcome::LimitReached(existing.len()));
        }

        let output = self.console.execute(&add_command(&marker)).await?;
        if !output.contains("Added marker") {
            tracing::warn!("Unable to add marker {}: {}", marker.id, output);
            return Ok(AddOutcome::Rejected(output));
        }
        tracing::info!("Added marker {} ({})", marker.id, marker.name);
        Ok(AddOutcome::Added(marker))
    }

    pub async fn remove(&self, author_id: &str, name: &str) -> Result<RemoveOutcome> {
        let markers = self.list(author_id).await?;
        let Some(marker) = markers.iter().find(|m| m.name == name) else {
            return Ok(RemoveOutcome::Unknown);
        };

        let output = self.console.execute(&remove_command(marker)).await?;
        if !output.contains("Deleted marker") {
            tracing::warn!("Unable to remove marker {}: {}", marker.id, output);
            return Ok(RemoveOutcome::Rejected(output));
        }
        Ok(RemoveOutcome::Removed)
    }
}
