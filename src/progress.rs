//! Structured progress reporting.
//!
//! The loader pushes one event per validation pass, per executed batch, and
//! per commit. Delivery is synchronous: sinks run on the loader's thread
//! and must not block indefinitely.

use serde::Serialize;

/// Pipeline phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Validation,
    Vertices,
    Edges,
    Cleanup,
}

impl LoadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadPhase::Validation => "validation",
            LoadPhase::Vertices => "vertices",
            LoadPhase::Edges => "edges",
            LoadPhase::Cleanup => "cleanup",
        }
    }
}

/// Failure details attached to an event when a batch failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressError {
    pub message: String,
    /// Stable error kind name (see `ErrorKind::as_str`).
    pub error_type: String,
    /// Batch index the failure occurred in, when batch-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub recoverable: bool,
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: LoadPhase,

    /// Label being processed; empty for validation/cleanup.
    pub label: String,

    pub processed: usize,
    pub total: usize,

    /// 0..100, rounded.
    pub percentage: u8,

    /// 1-based; only set for vertices/edges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,

    pub elapsed_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_remaining_ms: Option<u64>,

    /// Warnings raised while processing this batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProgressError>,

    /// The generated statement; only present in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Receives progress events from the loader.
pub trait ProgressSink {
    fn on_progress(&mut self, event: &ProgressEvent);
}

/// Discards all events.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&mut self, _event: &ProgressEvent) {}
}

/// Rounded percentage of `processed` out of `total`; 100 when there is
/// nothing to do.
pub fn percentage(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (((processed as u64) * 100 + (total as u64) / 2) / total as u64).min(100) as u8
}

/// Linear remaining-time estimate; undefined until progress exists and once
/// the work is done.
pub fn estimate_remaining_ms(elapsed_ms: u64, processed: usize, total: usize) -> Option<u64> {
    if processed == 0 || processed >= total {
        return None;
    }
    Some(elapsed_ms * (total - processed) as u64 / processed as u64)
}
