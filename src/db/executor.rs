//! Query execution traits.
//!
//! The loader is written against these traits rather than a concrete
//! driver. An executor is one database session: the staging table is
//! session-scoped, so a single executor value is threaded through one
//! `load` from `BEGIN` to `COMMIT`/`ROLLBACK`. Dropping the executor
//! returns the session, which covers every exit path.

use serde_json::Value as JsonValue;

use crate::error::BoxError;

/// A SQL statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Json(JsonValue),
}

/// Rows returned by a statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub row_count: u64,
}

impl QueryOutput {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Transaction configuration. Isolation is fixed at READ COMMITTED; the
/// timeout is enforced database-side.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOptions {
    pub timeout_ms: u64,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self { timeout_ms: 60_000 }
    }
}

/// One database session capable of running SQL and owning at most one
/// open transaction.
pub trait QueryExecutor {
    /// Execute a statement with positional parameters.
    fn execute_sql(&mut self, stmt: &str, params: &[SqlParam]) -> Result<QueryOutput, BoxError>;

    /// Begin a READ COMMITTED transaction with the configured timeout.
    /// Returns a session-unique transaction id for diagnostics.
    fn begin_transaction(&mut self, opts: &TransactionOptions) -> Result<u64, BoxError>;

    fn commit(&mut self) -> Result<(), BoxError>;

    fn rollback(&mut self) -> Result<(), BoxError>;
}

/// Source of database sessions. Acquisition maps to checking a connection
/// out of a pool; release is dropping the executor value.
pub trait ExecutorPool {
    type Executor: QueryExecutor;

    fn acquire(&mut self) -> Result<Self::Executor, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_options_default() {
        assert_eq!(TransactionOptions::default().timeout_ms, 60_000);
    }

    #[test]
    fn test_query_output_empty() {
        let out = QueryOutput::empty();
        assert!(out.headers.is_empty());
        assert!(out.rows.is_empty());
        assert_eq!(out.row_count, 0);
    }
}
