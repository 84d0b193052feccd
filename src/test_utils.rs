//! Test doubles for the loader pipeline.
//!
//! `MockExecutor` simulates the database surface the loader consumes: the
//! `age_params` staging table, the Cypher dispatch function (creation counts
//! derived from the most recently staged batch), and a live-graph vertex set
//! for endpoint checks. Failures are injectable per statement pattern, so
//! the state machine's error paths are testable without PostgreSQL.

use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::db::{ExecutorPool, QueryExecutor, QueryOutput, SqlParam, TransactionOptions};
use crate::error::BoxError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::types::id_string;

/// An injectable failure: the nth statement containing `pattern` fails
/// (0 = every occurrence).
#[derive(Debug, Clone)]
pub struct FailRule {
    pub pattern: String,
    pub occurrence: usize,
    seen: usize,
}

/// Shared state between a `MockPool` and the executors it hands out, so
/// tests can inspect what the loader did after the executor was dropped.
#[derive(Debug, Default)]
pub struct MockState {
    pub staged: Vec<(String, JsonValue)>,
    pub latest: HashMap<String, JsonValue>,
    pub executed: Vec<String>,
    pub begun: bool,
    pub committed: bool,
    pub rolled_back: bool,
    pub transaction_timeout_ms: Option<u64>,
    pub graph_vertices: HashMap<String, HashSet<String>>,
    pub vertex_created_override: Option<i64>,
    pub edge_created_override: Option<i64>,
    pub fail_rules: Vec<FailRule>,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub acquire_count: usize,
    pub fail_acquire: bool,
}

/// One simulated database session.
pub struct MockExecutor {
    state: Rc<RefCell<MockState>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState::default())),
        }
    }

    fn with_state(state: Rc<RefCell<MockState>>) -> Self {
        Self { state }
    }

    pub fn staged(&self) -> Vec<(String, JsonValue)> {
        self.state.borrow().staged.clone()
    }

    pub fn staged_value(&self, key: &str) -> Option<JsonValue> {
        self.state.borrow().latest.get(key).cloned()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.borrow().executed.clone()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExecutor for MockExecutor {
    fn execute_sql(&mut self, stmt: &str, params: &[SqlParam]) -> Result<QueryOutput, BoxError> {
        let mut state = self.state.borrow_mut();
        state.executed.push(stmt.to_string());

        for rule in &mut state.fail_rules {
            if stmt.contains(&rule.pattern) {
                rule.seen += 1;
                if rule.occurrence == 0 || rule.seen == rule.occurrence {
                    return Err(format!("injected failure for '{}'", rule.pattern).into());
                }
            }
        }

        if stmt.starts_with("INSERT INTO age_params") {
            let key = match params.first() {
                Some(SqlParam::Text(key)) => key.clone(),
                other => return Err(format!("expected text key parameter, got {:?}", other).into()),
            };
            let value = match params.get(1) {
                Some(SqlParam::Json(value)) => value.clone(),
                other => return Err(format!("expected JSON value parameter, got {:?}", other).into()),
            };
            state.staged.push((key.clone(), value.clone()));
            state.latest.insert(key, value);
            return Ok(QueryOutput {
                headers: Vec::new(),
                rows: Vec::new(),
                row_count: 1,
            });
        }

        if stmt.contains("created_vertices") {
            let label = extract_between(stmt, "get_vertices('", "')")
                .ok_or("statement has no get_vertices call")?;
            let batch = state
                .latest
                .get(&format!("vertex_{}", label))
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            let vertices = state.graph_vertices.entry(label).or_default();
            for record in batch.iter().filter_map(|v| v.as_object()) {
                if let Some(id) = record.get("id").and_then(id_string) {
                    vertices.insert(id);
                }
            }
            let created = state
                .vertex_created_override
                .unwrap_or(batch.len() as i64);
            return Ok(count_output("created_vertices", created));
        }

        if stmt.contains("created_edges") {
            let label = extract_between(stmt, "get_edges('", "')")
                .ok_or("statement has no get_edges call")?;
            let batch_len = state
                .latest
                .get(&format!("edge_{}", label))
                .and_then(|v| v.as_array())
                .map(Vec::len)
                .unwrap_or(0);
            let created = state.edge_created_override.unwrap_or(batch_len as i64);
            return Ok(count_output("created_edges", created));
        }

        if stmt.contains("get_param('") {
            let key = extract_between(stmt, "get_param('", "')")
                .ok_or("statement has no get_param call")?;
            let label =
                extract_between(stmt, "MATCH (v:", ")").ok_or("statement has no MATCH clause")?;
            let ids: Vec<String> = state
                .latest
                .get(&key)
                .and_then(|v| v.as_array())
                .map(|ids| ids.iter().filter_map(id_string).collect())
                .unwrap_or_default();
            let empty = HashSet::new();
            let known = state.graph_vertices.get(&label).unwrap_or(&empty);
            let rows: Vec<Vec<JsonValue>> = ids
                .iter()
                .filter(|id| known.contains(*id))
                .map(|id| vec![JsonValue::String(id.clone())])
                .collect();
            return Ok(QueryOutput {
                headers: vec!["id".to_string()],
                row_count: rows.len() as u64,
                rows,
            });
        }

        // Setup traffic (LOAD 'age', SET search_path, DDL).
        Ok(QueryOutput::empty())
    }

    fn begin_transaction(&mut self, opts: &TransactionOptions) -> Result<u64, BoxError> {
        let mut state = self.state.borrow_mut();
        if state.fail_begin {
            return Err("injected begin failure".into());
        }
        state.begun = true;
        state.transaction_timeout_ms = Some(opts.timeout_ms);
        Ok(1)
    }

    fn commit(&mut self) -> Result<(), BoxError> {
        let mut state = self.state.borrow_mut();
        if state.fail_commit {
            return Err("injected commit failure".into());
        }
        state.committed = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BoxError> {
        let mut state = self.state.borrow_mut();
        if state.fail_rollback {
            return Err("injected rollback failure".into());
        }
        state.rolled_back = true;
        Ok(())
    }
}

/// Pool handing out sessions that share one inspectable state.
pub struct MockPool {
    pub state: Rc<RefCell<MockState>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MockState::default())),
        }
    }

    /// Pre-populate the simulated live graph.
    pub fn seed_vertices(&self, label: &str, ids: &[&str]) {
        let mut state = self.state.borrow_mut();
        let set = state.graph_vertices.entry(label.to_string()).or_default();
        for id in ids {
            set.insert((*id).to_string());
        }
    }

    /// Fail the nth statement containing `pattern` (0 = every occurrence).
    pub fn fail_on(&self, pattern: &str, occurrence: usize) {
        self.state.borrow_mut().fail_rules.push(FailRule {
            pattern: pattern.to_string(),
            occurrence,
            seen: 0,
        });
    }

    pub fn acquire_count(&self) -> usize {
        self.state.borrow().acquire_count
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.borrow().executed.clone()
    }

    pub fn staged_keys(&self) -> Vec<String> {
        self.state
            .borrow()
            .staged
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Default for MockPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorPool for MockPool {
    type Executor = MockExecutor;

    fn acquire(&mut self) -> Result<MockExecutor, BoxError> {
        let mut state = self.state.borrow_mut();
        state.acquire_count += 1;
        if state.fail_acquire {
            return Err("injected acquire failure".into());
        }
        drop(state);
        Ok(MockExecutor::with_state(Rc::clone(&self.state)))
    }
}

/// Records every progress event it receives.
#[derive(Default)]
pub struct CollectingSink {
    pub events: Vec<ProgressEvent>,
}

impl ProgressSink for CollectingSink {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.events.push(event.clone());
    }
}

fn count_output(header: &str, count: i64) -> QueryOutput {
    QueryOutput {
        headers: vec![header.to_string()],
        rows: vec![vec![JsonValue::from(count)]],
        row_count: 1,
    }
}

fn extract_between(text: &str, start: &str, end: &str) -> Option<String> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(text[from..from + len].to_string())
}
