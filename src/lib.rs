//! age_loader library - Schema-driven bulk loader for Apache AGE graphs
//!
//! Provides schema modeling, payload validation, Cypher template compilation,
//! and the batch loading pipeline that streams graph data into PostgreSQL
//! with the Apache AGE extension inside a single transaction.

pub mod cypher;
pub mod db;
pub mod error;
pub mod loader;
pub mod progress;
pub mod schema;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

pub use error::{ErrorContext, ErrorKind, LoadError};
pub use loader::{BatchLoader, LoadOptions, LoadResult};
pub use progress::{LoadPhase, ProgressEvent, ProgressSink};
pub use schema::{EdgeDef, PropDef, PropType, Schema, VertexDef};
pub use types::{GraphData, Record};
pub use validation::{DataValidator, ValidationReport};
