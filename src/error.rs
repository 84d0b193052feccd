//! Loader error types.
//!
//! Every failure the loader reports carries a stable machine-readable kind,
//! a human-readable message, and structured context (phase, label, batch
//! index, offending statement) so callers can distinguish failure classes
//! programmatically.

use std::fmt;
use thiserror::Error;

/// Boxed error type used at the executor boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Machine-readable failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Payload rejected by the validator.
    ValidationFailed,
    /// Template generation against a label missing from the schema.
    SchemaUnknownLabel,
    /// Extension load, search-path setup, or transaction begin failed.
    SetupFailed,
    /// Staging-table write failed.
    StageFailed,
    /// Cypher template execution failed.
    ExecuteFailed,
    /// Endpoint lookup query failed.
    EndpointCheckFailed,
    /// Transaction commit failed.
    CommitFailed,
    /// Transaction rollback failed.
    RollbackFailed,
    /// Connection acquisition failed.
    ConnectionFailed,
}

impl ErrorKind {
    /// Stable snake_case name for programmatic handling.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::SchemaUnknownLabel => "schema_unknown_label",
            ErrorKind::SetupFailed => "setup_failed",
            ErrorKind::StageFailed => "stage_failed",
            ErrorKind::ExecuteFailed => "execute_failed",
            ErrorKind::EndpointCheckFailed => "endpoint_check_failed",
            ErrorKind::CommitFailed => "commit_failed",
            ErrorKind::RollbackFailed => "rollback_failed",
            ErrorKind::ConnectionFailed => "connection_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the pipeline an error occurred.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorContext {
    /// Pipeline phase name ("validation", "setup", "vertices", "edges",
    /// "commit", "rollback").
    pub phase: &'static str,
    pub label: Option<String>,
    /// Zero-based batch index within the label.
    pub batch_index: Option<usize>,
    /// The generated statement in flight, when one exists.
    pub statement: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.phase.is_empty() {
            return Ok(());
        }
        write!(f, " (phase: {}", self.phase)?;
        if let Some(label) = &self.label {
            write!(f, ", label: {}", label)?;
        }
        if let Some(batch) = self.batch_index {
            write!(f, ", batch: {}", batch)?;
        }
        write!(f, ")")
    }
}

/// A loader failure with taxonomy kind, context, and optional wrapped cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}{context}")]
pub struct LoadError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: ErrorContext,
    #[source]
    pub source: Option<BoxError>,
}

impl LoadError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }

    /// True when the failure may be downgraded to a warning under
    /// `continue_on_error` (edge-phase faults only).
    pub fn is_edge_recoverable(&self) -> bool {
        self.context.phase == "edges"
            && matches!(
                self.kind,
                ErrorKind::StageFailed | ErrorKind::ExecuteFailed | ErrorKind::EndpointCheckFailed
            )
    }
}
