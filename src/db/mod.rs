//! Database access layer.
//!
//! This module holds the loader's view of the database:
//! - The `QueryExecutor`/`ExecutorPool` traits the pipeline is written
//!   against (one executor = one session; staging and template execution
//!   must share a session because `age_params` is session-scoped)
//! - The parameter stager that writes batch payloads into `age_params`
//! - agtype result helpers (count and ID extraction)
//! - The PostgreSQL + Apache AGE implementation and its configuration
//! - Installer DDL for the staging table and helper functions

mod agtype;
mod config;
mod executor;
mod migrations;
mod postgres;
mod stager;

pub use agtype::{scalar_i64, scalar_string, single_count, string_column};
pub use config::AgeConfig;
pub use executor::{ExecutorPool, QueryExecutor, QueryOutput, SqlParam, TransactionOptions};
pub use migrations::{install, install_statements, PARAMS_TABLE};
pub use postgres::{AgePool, PostgresExecutor};
pub use stager::ParameterStager;

pub use crate::error::BoxError;
