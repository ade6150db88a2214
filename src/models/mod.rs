//! Domain records shared across the rotation pipeline.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Asset id → non-empty label set. Entries with zero labels are never stored;
/// a zero-label outcome only lands in the processed set. Ordered maps keep
/// the persisted encoding byte-stable across runs.
pub type LabelRecord = BTreeMap<String, BTreeSet<String>>;

/// Labels the user has chosen to rotate within. Empty means no filtering.
pub type FilterSelection = BTreeSet<String>;

/// A remote image resource identified by an opaque stable id.
///
/// Produced by the indexer, replaced wholesale on every listing refresh.
/// Identity is `id` alone; everything else is display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub display_name: String,
    pub mime_type: String,
    pub thumbnail_ref: Option<String>,
    pub size_bytes: Option<u64>,
}

/// A remote folder-like grouping of assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub id: String,
    pub title: String,
}
