//! Installer for the staging table and helper functions.
//!
//! The loader only *consumes* this surface; installation is an explicit
//! administrative call, never part of `load`. Every statement is
//! idempotent (`IF NOT EXISTS` / `OR REPLACE`), so re-running the
//! installer is safe.

use crate::error::BoxError;
use crate::schema::is_identifier;

use super::executor::QueryExecutor;

/// The session-scoped parameter staging table.
pub const PARAMS_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS age_params (key text PRIMARY KEY, value json)";

/// All statements needed to install the staging surface: the table, the
/// helper schema, and the three reader functions the Cypher templates call.
pub fn install_statements(helper_schema: &str) -> Result<Vec<String>, BoxError> {
    if !is_identifier(helper_schema) {
        return Err(format!("Invalid helper schema name '{}'", helper_schema).into());
    }

    Ok(vec![
        PARAMS_TABLE.to_string(),
        format!("CREATE SCHEMA IF NOT EXISTS {}", helper_schema),
        format!(
            "CREATE OR REPLACE FUNCTION {schema}.get_vertices(label_name text) \
             RETURNS SETOF agtype AS $fn$ \
             SELECT jsonb_array_elements(value::jsonb)::text::agtype \
             FROM age_params WHERE key = 'vertex_' || label_name \
             $fn$ LANGUAGE sql STABLE",
            schema = helper_schema
        ),
        format!(
            "CREATE OR REPLACE FUNCTION {schema}.get_edges(label_name text) \
             RETURNS SETOF agtype AS $fn$ \
             SELECT jsonb_array_elements(value::jsonb)::text::agtype \
             FROM age_params WHERE key = 'edge_' || label_name \
             $fn$ LANGUAGE sql STABLE",
            schema = helper_schema
        ),
        format!(
            "CREATE OR REPLACE FUNCTION {schema}.get_param(param_key text) \
             RETURNS agtype AS $fn$ \
             SELECT value::text::agtype \
             FROM age_params WHERE key = param_key \
             $fn$ LANGUAGE sql STABLE",
            schema = helper_schema
        ),
    ])
}

/// Run the installer against a session.
pub fn install(executor: &mut dyn QueryExecutor, helper_schema: &str) -> Result<(), BoxError> {
    for stmt in install_statements(helper_schema)? {
        executor.execute_sql(&stmt, &[])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent_forms() {
        let statements = install_statements("age_schema").unwrap();
        assert_eq!(statements.len(), 5);
        assert!(statements[0].contains("IF NOT EXISTS"));
        assert!(statements[1].contains("IF NOT EXISTS"));
        for stmt in &statements[2..] {
            assert!(stmt.contains("OR REPLACE"), "not idempotent: {}", stmt);
        }
    }

    #[test]
    fn test_helpers_target_schema() {
        let statements = install_statements("staging").unwrap();
        assert!(statements[2].contains("staging.get_vertices"));
        assert!(statements[3].contains("staging.get_edges"));
        assert!(statements[4].contains("staging.get_param"));
    }

    #[test]
    fn test_helpers_read_key_prefixes() {
        let statements = install_statements("age_schema").unwrap();
        assert!(statements[2].contains("'vertex_' || label_name"));
        assert!(statements[3].contains("'edge_' || label_name"));
        assert!(statements[4].contains("key = param_key"));
    }

    #[test]
    fn test_invalid_schema_name_rejected() {
        assert!(install_statements("bad schema").is_err());
        assert!(install_statements("drop; --").is_err());
    }

    #[test]
    fn test_install_runs_all_statements() {
        use crate::test_utils::MockExecutor;
        let mut executor = MockExecutor::new();
        install(&mut executor, "age_schema").unwrap();
        assert_eq!(executor.executed().len(), 5);
    }
}
