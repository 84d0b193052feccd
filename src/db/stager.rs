//! Batch payload staging.
//!
//! Writes one JSON document per batch into the session-scoped `age_params`
//! table. The server-side helpers (`get_vertices`, `get_edges`,
//! `get_param`) read the most recently staged value, so each batch
//! overwrites the previous one under the same key. Staging must run on the
//! same session that executes the corresponding template.

use serde_json::Value as JsonValue;

use crate::error::BoxError;

use super::executor::{QueryExecutor, SqlParam};

/// Upsert statement for the staging table. Last write wins, so re-staging
/// the same key is idempotent.
const STAGE_SQL: &str = "INSERT INTO age_params (key, value) VALUES ($1, $2) \
     ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value";

/// Writes batch payloads into the staging table.
pub struct ParameterStager;

impl ParameterStager {
    /// Stage `value` under `key`, replacing any previous value.
    pub fn stage(
        executor: &mut dyn QueryExecutor,
        key: &str,
        value: &JsonValue,
    ) -> Result<(), BoxError> {
        executor.execute_sql(
            STAGE_SQL,
            &[
                SqlParam::Text(key.to_string()),
                SqlParam::Json(value.clone()),
            ],
        )?;
        Ok(())
    }

    /// Staging key for a vertex label's current batch.
    pub fn vertex_key(label: &str) -> String {
        format!("vertex_{}", label)
    }

    /// Staging key for an edge label's current batch.
    pub fn edge_key(label: &str) -> String {
        format!("edge_{}", label)
    }

    /// Staging key for an edge label's `from` endpoint ID array.
    pub fn from_ids_key(label: &str) -> String {
        format!("from_ids_{}", label)
    }

    /// Staging key for an edge label's `to` endpoint ID array.
    pub fn to_ids_key(label: &str) -> String {
        format!("to_ids_{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockExecutor;
    use serde_json::json;

    #[test]
    fn test_key_naming() {
        assert_eq!(ParameterStager::vertex_key("Person"), "vertex_Person");
        assert_eq!(ParameterStager::edge_key("WORKS_AT"), "edge_WORKS_AT");
        assert_eq!(ParameterStager::from_ids_key("WORKS_AT"), "from_ids_WORKS_AT");
        assert_eq!(ParameterStager::to_ids_key("WORKS_AT"), "to_ids_WORKS_AT");
    }

    #[test]
    fn test_stage_issues_upsert() {
        let mut executor = MockExecutor::new();
        let batch = json!([{"id": "p1"}]);
        ParameterStager::stage(&mut executor, "vertex_Person", &batch).unwrap();

        assert_eq!(executor.staged().len(), 1);
        assert_eq!(executor.staged()[0], ("vertex_Person".to_string(), batch));
        assert!(executor.executed()[0].contains("ON CONFLICT (key) DO UPDATE"));
    }

    #[test]
    fn test_restaging_overwrites() {
        let mut executor = MockExecutor::new();
        ParameterStager::stage(&mut executor, "vertex_Person", &json!([{"id": "p1"}])).unwrap();
        ParameterStager::stage(&mut executor, "vertex_Person", &json!([{"id": "p2"}])).unwrap();

        assert_eq!(
            executor.staged_value("vertex_Person"),
            Some(json!([{"id": "p2"}]))
        );
    }

    #[test]
    fn test_restaging_same_value_is_idempotent() {
        let mut executor = MockExecutor::new();
        let batch = json!([{"id": "p1"}]);
        ParameterStager::stage(&mut executor, "vertex_Person", &batch).unwrap();
        ParameterStager::stage(&mut executor, "vertex_Person", &batch).unwrap();

        assert_eq!(executor.staged_value("vertex_Person"), Some(batch));
    }
}
