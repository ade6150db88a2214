//! The persisted string encodings for classification state.
//!
//! These formats are a compatibility contract:
//! - processed set: comma-joined id list
//! - label record: newline-separated `id=label1|label2|...`
//! - filter selection: comma-joined label list
//!
//! Encoders take ordered collections, so equal states always produce
//! identical bytes; "persist only if changed" compares encoded strings.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{FilterSelection, LabelRecord};

pub fn encode_id_set(ids: &BTreeSet<String>) -> String {
    ids.iter().cloned().collect::<Vec<_>>().join(",")
}

pub fn decode_id_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn encode_record(record: &LabelRecord) -> String {
    let mut lines = Vec::with_capacity(record.len());
    for (id, labels) in record {
        if labels.is_empty() {
            continue;
        }
        let joined = labels.iter().cloned().collect::<Vec<_>>().join("|");
        lines.push(format!("{id}={joined}"));
    }
    lines.join("\n")
}

pub fn decode_record(raw: &str) -> LabelRecord {
    let mut record = BTreeMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((id, labels)) = line.split_once('=') else {
            continue;
        };
        let labels: BTreeSet<String> = labels
            .split('|')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();
        if id.is_empty() || labels.is_empty() {
            continue;
        }
        record.insert(id.to_string(), labels);
    }
    record
}

pub fn encode_filter(selection: &FilterSelection) -> String {
    encode_id_set(selection)
}

pub fn decode_filter(raw: &str) -> FilterSelection {
    decode_id_set(raw)
}
