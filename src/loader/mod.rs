//! The batch loading pipeline.
//!
//! `BatchLoader` drives a payload into the graph in four stages inside one
//! transaction: validate, set up the session, load all vertex batches, load
//! all edge batches, then commit. Every batch is staged into `age_params`
//! and materialized by a compiled Cypher template on the same session.
//!
//! # Failure policy
//!
//! Validation failures abort before any database work. Faults during setup
//! or vertex loading are always fatal (a partially created vertex set would
//! invalidate edge endpoints). Edge-label and edge-batch faults downgrade
//! to warnings under `continue_on_error`. On any fatal fault the loader
//! rolls back, captures a rollback fault separately, and reports partial
//! counts for forensics.

mod batch;


use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::time::Instant;

use crate::cypher::{CypherCompiler, NullHandling, DEFAULT_HELPER_SCHEMA};
use crate::db::{
    single_count, string_column, ExecutorPool, ParameterStager, QueryExecutor, TransactionOptions,
};
use crate::error::{ErrorContext, ErrorKind, LoadError};
use crate::progress::{
    estimate_remaining_ms, percentage, LoadPhase, NoopSink, ProgressError, ProgressEvent,
    ProgressSink,
};
use crate::schema::{EdgeDef, Schema};
use crate::types::GraphData;
use crate::validation::DataValidator;

use batch::{endpoint_ids, filter_edges_by_endpoints, total_batches};

/// Loader configuration. All fields have defaults and deserialize from
/// camelCase documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadOptions {
    /// Target graph; falls back to the loader's default graph.
    pub graph_name: Option<String>,

    /// Records per staged batch; must be > 0.
    pub batch_size: usize,

    /// Run the validator before any database work.
    pub validate_before_load: bool,

    /// Downgrade edge-label/edge-batch failures to warnings and keep going.
    pub continue_on_error: bool,

    /// Database-enforced transaction timeout.
    pub transaction_timeout_ms: u64,

    /// Include accumulated warnings in the returned `LoadResult`.
    pub collect_warnings: bool,

    /// Include generated statements in progress events.
    pub debug: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            graph_name: None,
            batch_size: 1000,
            validate_before_load: true,
            continue_on_error: false,
            transaction_timeout_ms: 60_000,
            collect_warnings: true,
            debug: false,
        }
    }
}

/// Outcome of one `load` invocation.
#[derive(Debug)]
pub struct LoadResult {
    pub success: bool,
    pub vertex_count: u64,
    pub edge_count: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<LoadError>,
    pub duration_ms: u64,
}

/// Schema-aware bulk loader for one target graph.
///
/// The loader holds no mutable state between invocations; independent
/// `load` calls on distinct sessions may run in parallel.
pub struct BatchLoader {
    schema: Schema,
    graph_name: String,
    helper_schema: String,
    null_handling: NullHandling,
    index_hints: bool,
}

impl BatchLoader {
    pub fn new(schema: Schema, graph_name: impl Into<String>) -> Self {
        Self {
            schema,
            graph_name: graph_name.into(),
            helper_schema: DEFAULT_HELPER_SCHEMA.to_string(),
            null_handling: NullHandling::default(),
            index_hints: false,
        }
    }

    pub fn with_helper_schema(mut self, helper_schema: impl Into<String>) -> Self {
        self.helper_schema = helper_schema.into();
        self
    }

    pub fn with_null_handling(mut self, null_handling: NullHandling) -> Self {
        self.null_handling = null_handling;
        self
    }

    pub fn with_index_hints(mut self, index_hints: bool) -> Self {
        self.index_hints = index_hints;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Load a payload without progress reporting.
    pub fn load<P: ExecutorPool>(
        &self,
        pool: &mut P,
        data: &GraphData,
        opts: &LoadOptions,
    ) -> LoadResult {
        self.load_with_progress(pool, data, opts, &mut NoopSink)
    }

    /// Load a payload, pushing progress events into `sink`.
    pub fn load_with_progress<P: ExecutorPool>(
        &self,
        pool: &mut P,
        data: &GraphData,
        opts: &LoadOptions,
        sink: &mut dyn ProgressSink,
    ) -> LoadResult {
        let mut run = LoadRun {
            opts,
            sink,
            start: Instant::now(),
            vertex_count: 0,
            edge_count: 0,
            warnings: Vec::new(),
        };

        let batch_size = if opts.batch_size == 0 {
            run.warn("batchSize must be > 0; using 1".to_string());
            1
        } else {
            opts.batch_size
        };

        let total_records = count_records(data);

        if opts.validate_before_load {
            let report = DataValidator::new(&self.schema).validate(data);
            for warning in &report.warnings {
                run.warn(warning.clone());
            }
            if !report.is_valid() {
                run.emit_phase(
                    LoadPhase::Validation,
                    total_records,
                    Some(ProgressError {
                        message: format!("Payload failed validation ({} errors)", report.errors.len()),
                        error_type: ErrorKind::ValidationFailed.as_str().to_string(),
                        index: None,
                        recoverable: false,
                    }),
                );
                let errors = report
                    .errors
                    .iter()
                    .map(|e| {
                        LoadError::new(ErrorKind::ValidationFailed, e.to_string()).with_context(
                            ErrorContext {
                                phase: "validation",
                                ..Default::default()
                            },
                        )
                    })
                    .collect();
                return run.finish(false, errors);
            }
            run.emit_phase(LoadPhase::Validation, total_records, None);
        }

        let graph_name = opts
            .graph_name
            .clone()
            .unwrap_or_else(|| self.graph_name.clone());
        let compiler = CypherCompiler::new(&self.schema, graph_name)
            .with_helper_schema(self.helper_schema.as_str())
            .with_null_handling(self.null_handling)
            .with_index_hints(self.index_hints);

        let mut executor = match pool.acquire() {
            Ok(executor) => executor,
            Err(e) => {
                return run.finish(
                    false,
                    vec![LoadError::new(
                        ErrorKind::ConnectionFailed,
                        "Failed to acquire a database session",
                    )
                    .with_source(e)
                    .with_context(ErrorContext {
                        phase: "setup",
                        ..Default::default()
                    })],
                );
            }
        };
        let executor: &mut dyn QueryExecutor = &mut executor;

        let tx_opts = TransactionOptions {
            timeout_ms: opts.transaction_timeout_ms,
        };
        if let Err(e) = executor.begin_transaction(&tx_opts) {
            // Nothing started yet, so there is nothing to roll back.
            return run.finish(
                false,
                vec![LoadError::new(ErrorKind::SetupFailed, "Failed to begin transaction")
                    .with_source(e)
                    .with_context(ErrorContext {
                        phase: "setup",
                        ..Default::default()
                    })],
            );
        }

        let outcome = self.drive(&compiler, executor, data, &mut run, batch_size);

        match outcome {
            Ok(()) => {
                run.emit_phase(LoadPhase::Cleanup, total_records, None);
                match executor.commit() {
                    Ok(()) => {
                        log::debug!(
                            "load committed: {} vertices, {} edges",
                            run.vertex_count,
                            run.edge_count
                        );
                        run.finish(true, Vec::new())
                    }
                    Err(e) => {
                        let err = LoadError::new(ErrorKind::CommitFailed, "Commit failed")
                            .with_source(e)
                            .with_context(ErrorContext {
                                phase: "commit",
                                ..Default::default()
                            });
                        rollback_path(executor, run, err)
                    }
                }
            }
            Err(err) => rollback_path(executor, run, err),
        }
    }

    /// Session init plus the vertex and edge phases, in order. Any error
    /// escaping here sends the load down the rollback path.
    fn drive(
        &self,
        compiler: &CypherCompiler,
        executor: &mut dyn QueryExecutor,
        data: &GraphData,
        run: &mut LoadRun,
        batch_size: usize,
    ) -> Result<(), LoadError> {
        let setup_ctx = || ErrorContext {
            phase: "setup",
            ..Default::default()
        };
        executor
            .execute_sql("LOAD 'age'", &[])
            .map_err(|e| {
                LoadError::new(ErrorKind::SetupFailed, "Failed to load the AGE extension")
                    .with_source(e)
                    .with_context(setup_ctx())
            })?;
        executor
            .execute_sql("SET search_path = ag_catalog, \"$user\", public", &[])
            .map_err(|e| {
                LoadError::new(ErrorKind::SetupFailed, "Failed to set search_path")
                    .with_source(e)
                    .with_context(setup_ctx())
            })?;

        self.load_vertices(compiler, executor, data, run, batch_size)?;
        self.load_edges(compiler, executor, data, run, batch_size)?;
        Ok(())
    }

    fn load_vertices(
        &self,
        compiler: &CypherCompiler,
        executor: &mut dyn QueryExecutor,
        data: &GraphData,
        run: &mut LoadRun,
        batch_size: usize,
    ) -> Result<(), LoadError> {
        let Some(vertices) = &data.vertices else {
            return Ok(());
        };

        for (label, value) in vertices.iter() {
            if self.schema.vertex_def(label).is_none() {
                run.warn(format!("Unknown vertex label '{}' skipped", label));
                continue;
            }
            let Some(records) = value.as_array() else {
                run.warn(format!("Vertex label '{}' is not an array; skipped", label));
                continue;
            };
            if records.is_empty() {
                continue;
            }

            let stmt = compiler.compile_vertex_create(label).map_err(|e| {
                e.with_context(ErrorContext {
                    phase: "vertices",
                    label: Some(label.to_string()),
                    ..Default::default()
                })
            })?;
            let key = ParameterStager::vertex_key(label);
            let total = records.len();
            let n_batches = total_batches(total, batch_size);
            let mut processed = 0usize;

            for (index, chunk) in records.chunks(batch_size).enumerate() {
                let ctx = ErrorContext {
                    phase: "vertices",
                    label: Some(label.to_string()),
                    batch_index: Some(index),
                    statement: None,
                };
                ParameterStager::stage(executor, &key, &JsonValue::Array(chunk.to_vec()))
                    .map_err(|e| {
                        LoadError::new(
                            ErrorKind::StageFailed,
                            format!("Failed to stage batch for vertex label '{}'", label),
                        )
                        .with_source(e)
                        .with_context(ctx.clone())
                    })?;
                let output = executor.execute_sql(&stmt, &[]).map_err(|e| {
                    LoadError::new(
                        ErrorKind::ExecuteFailed,
                        format!("Vertex creation failed for label '{}'", label),
                    )
                    .with_source(e)
                    .with_context(ErrorContext {
                        statement: Some(stmt.clone()),
                        ..ctx
                    })
                })?;

                let created = single_count(&output).unwrap_or(0).max(0);
                run.vertex_count += created as u64;
                processed += chunk.len();

                let mut batch_warnings = Vec::new();
                if (created as usize) < chunk.len() {
                    let warning = format!(
                        "Only {} of {} vertices of type {} were created in batch {}/{}",
                        created,
                        chunk.len(),
                        label,
                        index + 1,
                        n_batches
                    );
                    batch_warnings.push(warning.clone());
                    run.warn(warning);
                }

                run.emit_batch(
                    LoadPhase::Vertices,
                    label,
                    processed,
                    total,
                    index + 1,
                    n_batches,
                    batch_warnings,
                    None,
                    debug_statement(run.opts, &stmt),
                );
            }
        }

        Ok(())
    }

    fn load_edges(
        &self,
        compiler: &CypherCompiler,
        executor: &mut dyn QueryExecutor,
        data: &GraphData,
        run: &mut LoadRun,
        batch_size: usize,
    ) -> Result<(), LoadError> {
        let Some(edges) = &data.edges else {
            return Ok(());
        };

        for (label, value) in edges.iter() {
            let Some(def) = self.schema.edge_def(label) else {
                run.warn(format!("Unknown edge label '{}' skipped", label));
                continue;
            };
            let Some(records) = value.as_array() else {
                run.warn(format!("Edge label '{}' is not an array; skipped", label));
                continue;
            };
            if records.is_empty() {
                continue;
            }

            match self.load_edge_label(compiler, executor, run, label, def, records, batch_size) {
                Ok(()) => {}
                Err(err) if run.opts.continue_on_error && err.is_edge_recoverable() => {
                    let message = format!("Edge label '{}' failed: {}; continuing", label, err);
                    run.emit_batch(
                        LoadPhase::Edges,
                        label,
                        0,
                        records.len(),
                        err.context.batch_index.map(|i| i + 1).unwrap_or(1),
                        total_batches(records.len(), batch_size),
                        Vec::new(),
                        Some(ProgressError {
                            message: err.to_string(),
                            error_type: err.kind.as_str().to_string(),
                            index: err.context.batch_index,
                            recoverable: true,
                        }),
                        None,
                    );
                    run.warn(message);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn load_edge_label(
        &self,
        compiler: &CypherCompiler,
        executor: &mut dyn QueryExecutor,
        run: &mut LoadRun,
        label: &str,
        def: &EdgeDef,
        records: &[JsonValue],
        batch_size: usize,
    ) -> Result<(), LoadError> {
        // Endpoint pre-validation against the live graph, before any batch
        // of this label executes.
        let (from_ids, to_ids) = endpoint_ids(records);
        let from_key = ParameterStager::from_ids_key(label);
        let to_key = ParameterStager::to_ids_key(label);
        let present_from =
            self.lookup_endpoints(compiler, executor, label, &def.from_label, &from_key, &from_ids)?;
        let present_to =
            self.lookup_endpoints(compiler, executor, label, &def.to_label, &to_key, &to_ids)?;

        warn_missing_endpoints(run, label, "from", &def.from_label, &from_ids, &present_from);
        warn_missing_endpoints(run, label, "to", &def.to_label, &to_ids, &present_to);

        let filtered = filter_edges_by_endpoints(records, &present_from, &present_to);
        if filtered.dropped > 0 {
            run.warn(format!(
                "Skipped {} edge(s) of label '{}' with endpoints missing from the graph",
                filtered.dropped, label
            ));
        }
        if filtered.kept.is_empty() {
            return Ok(());
        }

        let stmt = compiler.compile_edge_create(label).map_err(|e| {
            e.with_context(ErrorContext {
                phase: "edges",
                label: Some(label.to_string()),
                ..Default::default()
            })
        })?;
        let key = ParameterStager::edge_key(label);
        let total = filtered.kept.len();
        let n_batches = total_batches(total, batch_size);
        let mut processed = 0usize;

        for (index, chunk) in filtered.kept.chunks(batch_size).enumerate() {
            let result = self.run_edge_batch(
                executor, run, &stmt, &key, label, index, n_batches, chunk, processed, total,
            );
            match result {
                Ok(new_processed) => processed = new_processed,
                Err(err) if run.opts.continue_on_error && err.is_edge_recoverable() => {
                    let message = format!(
                        "Edge batch {}/{} of label '{}' failed: {}",
                        index + 1,
                        n_batches,
                        label,
                        err
                    );
                    run.emit_batch(
                        LoadPhase::Edges,
                        label,
                        processed,
                        total,
                        index + 1,
                        n_batches,
                        Vec::new(),
                        Some(ProgressError {
                            message: err.to_string(),
                            error_type: err.kind.as_str().to_string(),
                            index: Some(index),
                            recoverable: true,
                        }),
                        debug_statement(run.opts, &stmt),
                    );
                    run.warn(message);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_edge_batch(
        &self,
        executor: &mut dyn QueryExecutor,
        run: &mut LoadRun,
        stmt: &str,
        key: &str,
        label: &str,
        index: usize,
        n_batches: usize,
        chunk: &[JsonValue],
        processed: usize,
        total: usize,
    ) -> Result<usize, LoadError> {
        let ctx = ErrorContext {
            phase: "edges",
            label: Some(label.to_string()),
            batch_index: Some(index),
            statement: None,
        };
        ParameterStager::stage(executor, key, &JsonValue::Array(chunk.to_vec())).map_err(|e| {
            LoadError::new(
                ErrorKind::StageFailed,
                format!("Failed to stage batch for edge label '{}'", label),
            )
            .with_source(e)
            .with_context(ctx.clone())
        })?;
        let output = executor.execute_sql(stmt, &[]).map_err(|e| {
            LoadError::new(
                ErrorKind::ExecuteFailed,
                format!("Edge creation failed for label '{}'", label),
            )
            .with_source(e)
            .with_context(ErrorContext {
                statement: Some(stmt.to_string()),
                ..ctx
            })
        })?;

        let created = single_count(&output).unwrap_or(0).max(0);
        run.edge_count += created as u64;
        let new_processed = processed + chunk.len();

        let mut batch_warnings = Vec::new();
        if (created as usize) < chunk.len() {
            let warning = format!(
                "Only {} of {} edges of type {} were created in batch {}/{}",
                created,
                chunk.len(),
                label,
                index + 1,
                n_batches
            );
            batch_warnings.push(warning.clone());
            run.warn(warning);
        }

        run.emit_batch(
            LoadPhase::Edges,
            label,
            new_processed,
            total,
            index + 1,
            n_batches,
            batch_warnings,
            None,
            debug_statement(run.opts, stmt),
        );

        Ok(new_processed)
    }

    /// Which of `ids` exist as vertices of `vertex_label` in the live
    /// graph. IDs travel through the staging table, never through the
    /// statement text.
    fn lookup_endpoints(
        &self,
        compiler: &CypherCompiler,
        executor: &mut dyn QueryExecutor,
        edge_label: &str,
        vertex_label: &str,
        key: &str,
        ids: &[String],
    ) -> Result<HashSet<String>, LoadError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ctx = ErrorContext {
            phase: "edges",
            label: Some(edge_label.to_string()),
            ..Default::default()
        };
        ParameterStager::stage(executor, key, &serde_json::json!(ids)).map_err(|e| {
            LoadError::new(
                ErrorKind::StageFailed,
                format!("Failed to stage endpoint IDs under '{}'", key),
            )
            .with_source(e)
            .with_context(ctx.clone())
        })?;

        let stmt = compiler.compile_endpoint_check(vertex_label, key);
        let output = executor.execute_sql(&stmt, &[]).map_err(|e| {
            LoadError::new(
                ErrorKind::EndpointCheckFailed,
                format!("Endpoint check against '{}' failed", vertex_label),
            )
            .with_source(e)
            .with_context(ErrorContext {
                statement: Some(stmt.clone()),
                ..ctx
            })
        })?;

        Ok(string_column(&output).into_iter().collect())
    }
}

/// Attempt rollback, capture a rollback fault separately, and return the
/// failed result. Rollback faults are recorded, never re-thrown.
fn rollback_path(executor: &mut dyn QueryExecutor, run: LoadRun, err: LoadError) -> LoadResult {
    log::error!("load failed: {}; rolling back", err);
    let mut errors = vec![err];
    if let Err(e) = executor.rollback() {
        log::error!("rollback failed: {}", e);
        errors.push(
            LoadError::new(ErrorKind::RollbackFailed, "Rollback failed")
                .with_source(e)
                .with_context(ErrorContext {
                    phase: "rollback",
                    ..Default::default()
                }),
        );
    }
    run.finish(false, errors)
}

fn warn_missing_endpoints(
    run: &mut LoadRun,
    edge_label: &str,
    side: &str,
    vertex_label: &str,
    ids: &[String],
    present: &HashSet<String>,
) {
    let missing: Vec<&str> = ids
        .iter()
        .filter(|id| !present.contains(*id))
        .map(|id| id.as_str())
        .collect();
    if missing.is_empty() {
        return;
    }
    let shown = missing.iter().take(10).copied().collect::<Vec<_>>().join(", ");
    let suffix = if missing.len() > 10 {
        format!(" (first 10 of {} shown)", missing.len())
    } else {
        String::new()
    };
    run.warn(format!(
        "{} '{}' ID(s) of edge label '{}' match no {} vertex: {}{}",
        missing.len(),
        side,
        edge_label,
        vertex_label,
        shown,
        suffix
    ));
}

fn debug_statement(opts: &LoadOptions, stmt: &str) -> Option<String> {
    opts.debug.then(|| stmt.to_string())
}

/// Total record count across both payload sections.
fn count_records(data: &GraphData) -> usize {
    let section_len = |section: &Option<crate::types::OrderedMap<JsonValue>>| {
        section
            .as_ref()
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(_, v)| v.as_array().map(Vec::len))
                    .sum()
            })
            .unwrap_or(0)
    };
    section_len(&data.vertices) + section_len(&data.edges)
}

/// Per-invocation loading state. Deliberately local to one `load` call so
/// concurrent loads never share counters or the clock.
struct LoadRun<'a> {
    opts: &'a LoadOptions,
    sink: &'a mut dyn ProgressSink,
    start: Instant,
    vertex_count: u64,
    edge_count: u64,
    warnings: Vec<String>,
}

impl LoadRun<'_> {
    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        if self.opts.collect_warnings {
            self.warnings.push(message);
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn emit_phase(&mut self, phase: LoadPhase, total: usize, error: Option<ProgressError>) {
        let event = ProgressEvent {
            phase,
            label: String::new(),
            processed: total,
            total,
            percentage: 100,
            batch_number: None,
            total_batches: None,
            elapsed_ms: self.elapsed_ms(),
            estimated_remaining_ms: None,
            warnings: None,
            error,
            statement: None,
        };
        self.sink.on_progress(&event);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_batch(
        &mut self,
        phase: LoadPhase,
        label: &str,
        processed: usize,
        total: usize,
        batch_number: usize,
        total_batches: usize,
        warnings: Vec<String>,
        error: Option<ProgressError>,
        statement: Option<String>,
    ) {
        let elapsed_ms = self.elapsed_ms();
        let event = ProgressEvent {
            phase,
            label: label.to_string(),
            processed,
            total,
            percentage: percentage(processed, total),
            batch_number: Some(batch_number),
            total_batches: Some(total_batches),
            elapsed_ms,
            estimated_remaining_ms: estimate_remaining_ms(elapsed_ms, processed, total),
            warnings: (!warnings.is_empty()).then_some(warnings),
            error,
            statement,
        };
        self.sink.on_progress(&event);
    }

    fn finish(self, success: bool, errors: Vec<LoadError>) -> LoadResult {
        LoadResult {
            success,
            vertex_count: self.vertex_count,
            edge_count: self.edge_count,
            warnings: self.warnings,
            errors,
            duration_ms: self.start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = LoadOptions::default();
        assert_eq!(opts.batch_size, 1000);
        assert!(opts.validate_before_load);
        assert!(!opts.continue_on_error);
        assert_eq!(opts.transaction_timeout_ms, 60_000);
        assert!(opts.collect_warnings);
        assert!(!opts.debug);
        assert!(opts.graph_name.is_none());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let opts: LoadOptions = serde_json::from_str(
            r#"{"batchSize": 500, "continueOnError": true, "graphName": "hr"}"#,
        )
        .unwrap();
        assert_eq!(opts.batch_size, 500);
        assert!(opts.continue_on_error);
        assert_eq!(opts.graph_name.as_deref(), Some("hr"));
        // Unspecified fields keep their defaults.
        assert!(opts.validate_before_load);
    }
}
