//! Label vocabulary, filter eligibility, and the random draw.

use std::collections::HashSet;

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{Asset, FilterSelection, LabelRecord};
use crate::store::{codec, StateStore, KEY_LABEL_FILTER};

/// Sorted, deduplicated union of every label in the record. Derived fresh on
/// each call; never cached anywhere.
pub fn available_labels(record: &LabelRecord) -> Vec<String> {
    let mut labels: Vec<String> = record
        .values()
        .flat_map(|set| set.iter().cloned())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

/// The eligible subset for a draw. `All` is the use-all sentinel an empty
/// filter maps to; it is distinct from an empty id set, which means nothing
/// qualifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    All,
    Ids(HashSet<String>),
}

pub fn eligible_ids(record: &LabelRecord, filter: &FilterSelection) -> Eligibility {
    if filter.is_empty() {
        return Eligibility::All;
    }

    let ids = record
        .iter()
        .filter(|(_, labels)| labels.iter().any(|label| filter.contains(label)))
        .map(|(id, _)| id.clone())
        .collect();
    Eligibility::Ids(ids)
}

/// Uniform draw over the eligible subset of `assets` (or all of them for the
/// sentinel). `None` when the subset is empty. Uniform per asset, never
/// weighted by how many labels matched.
pub fn sample<'a, R: Rng + ?Sized>(
    assets: &'a [Asset],
    eligibility: &Eligibility,
    rng: &mut R,
) -> Option<&'a Asset> {
    match eligibility {
        Eligibility::All => assets.choose(rng),
        Eligibility::Ids(ids) => {
            let eligible: Vec<&Asset> = assets.iter().filter(|a| ids.contains(&a.id)).collect();
            eligible.choose(rng).copied()
        }
    }
}

/// Load the persisted filter selection; missing key means no filtering.
pub async fn load_filter(store: &StateStore) -> Result<FilterSelection> {
    let raw = store.get(KEY_LABEL_FILTER).await?;
    Ok(raw.map(|s| codec::decode_filter(&s)).unwrap_or_default())
}

pub async fn store_filter(store: &StateStore, selection: &FilterSelection) -> Result<()> {
    store
        .set(KEY_LABEL_FILTER, &codec::encode_filter(selection))
        .await
}
