//! agtype result extraction.
//!
//! The dispatch function returns `agtype` cells. Depending on the driver
//! path they surface either as native JSON values or as agtype text (where
//! strings keep their surrounding quotes), so the extractors here accept
//! both shapes.

use serde_json::Value as JsonValue;

use super::executor::QueryOutput;

/// Extract an integer from an agtype-shaped cell.
pub fn scalar_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Extract a string from an agtype-shaped cell, stripping agtype text
/// quoting when present. Numbers coerce to their string form (IDs compare
/// as strings).
pub fn scalar_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            let trimmed = s.trim();
            let unquoted = trimmed
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .unwrap_or(trimmed);
            Some(unquoted.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read the single count cell returned by a creation template
/// (`RETURN count(…) AS created_…`).
pub fn single_count(output: &QueryOutput) -> Option<i64> {
    output.rows.first()?.first().and_then(scalar_i64)
}

/// Read the first column of every row as a string (endpoint ID lookups).
pub fn string_column(output: &QueryOutput) -> Vec<String> {
    output
        .rows
        .iter()
        .filter_map(|row| row.first().and_then(scalar_string))
        .collect()
}
