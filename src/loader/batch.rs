//! Batch partitioning and endpoint filtering.
//!
//! Pure helpers: the loader batches over slices returned from here and
//! never mutates the caller's payload.

use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::types::id_string;

/// Number of batches a label of `len` records produces at `batch_size`.
pub fn total_batches(len: usize, batch_size: usize) -> usize {
    len.div_ceil(batch_size)
}

/// Deduplicated `from`/`to` endpoint IDs of an edge record list, in first
/// occurrence order.
pub fn endpoint_ids(records: &[JsonValue]) -> (Vec<String>, Vec<String>) {
    let mut from_ids: Vec<String> = Vec::new();
    let mut to_ids: Vec<String> = Vec::new();
    let mut seen_from: HashSet<String> = HashSet::new();
    let mut seen_to: HashSet<String> = HashSet::new();

    for record in records.iter().filter_map(|v| v.as_object()) {
        if let Some(id) = record.get("from").and_then(id_string) {
            if seen_from.insert(id.clone()) {
                from_ids.push(id);
            }
        }
        if let Some(id) = record.get("to").and_then(id_string) {
            if seen_to.insert(id.clone()) {
                to_ids.push(id);
            }
        }
    }

    (from_ids, to_ids)
}

/// Result of endpoint filtering: the surviving records and the number
/// dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointFilter {
    pub kept: Vec<JsonValue>,
    pub dropped: usize,
}

/// Keep only edges whose `from`/`to` both exist in the corresponding
/// present-ID sets. Produces a new list; the input is untouched. Records
/// that are not mappings or lack coercible endpoints are dropped too (they
/// could never match).
pub fn filter_edges_by_endpoints(
    records: &[JsonValue],
    present_from: &HashSet<String>,
    present_to: &HashSet<String>,
) -> EndpointFilter {
    let kept: Vec<JsonValue> = records
        .iter()
        .filter(|value| {
            let Some(record) = value.as_object() else {
                return false;
            };
            let from = record.get("from").and_then(id_string);
            let to = record.get("to").and_then(id_string);
            match (from, to) {
                (Some(from), Some(to)) => present_from.contains(&from) && present_to.contains(&to),
                _ => false,
            }
        })
        .cloned()
        .collect();

    EndpointFilter {
        dropped: records.len() - kept.len(),
        kept,
    }
}
