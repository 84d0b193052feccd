//! Cypher template compilation for Apache AGE.
//!
//! Generates the SQL statements the loader executes: vertex/edge creation
//! templates that `UNWIND` staged JSON through the server-side helper
//! functions, and endpoint existence checks. Statements are pure functions
//! of the schema and compiler configuration; record data never appears in
//! generated text.

mod compiler;
mod escape;

pub use compiler::{CypherCompiler, NullHandling, DEFAULT_HELPER_SCHEMA};
pub use escape::{quote_cypher_string, quote_sql_string};
