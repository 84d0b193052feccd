//! String escaping for generated statements.
//!
//! Labels, property names and staging keys are identifier-checked by the
//! schema, so these escapes are a second line of defense for the few places
//! a quoted literal is unavoidable (graph names, staged-key arguments).

/// Escape a string for a single-quoted SQL literal (quote doubling).
pub fn quote_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Escape a string for a single-quoted Cypher literal inside the
/// dollar-quoted dispatch body.
pub fn quote_cypher_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            c => result.push(c),
        }
    }
    result
}
