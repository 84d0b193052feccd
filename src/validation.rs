//! Payload validation against a graph schema.
//!
//! The validator is pure: it walks the payload once, accumulates structured
//! errors and free-form warnings, and never touches the database. Endpoint
//! existence against the *live* graph is not checked here; that happens at
//! load time. The payload-level endpoint cross-check below only warns when
//! an edge references an ID that is absent from the staged vertex records.

use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::schema::{
    EdgeDef, PropType, Schema, VertexDef, RESERVED_EDGE_PROPS, RESERVED_VERTEX_PROPS,
};
use crate::types::{id_string, GraphData, Record};

/// Structured validation failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingVertices,
    UnknownVertexLabel,
    UnknownEdgeLabel,
    NotASequence,
    NotAMapping,
    MissingId,
    MissingEndpoint,
    MissingRequired,
    TypeMismatch,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorKind::MissingVertices => "missing_vertices",
            ValidationErrorKind::UnknownVertexLabel => "unknown_vertex_label",
            ValidationErrorKind::UnknownEdgeLabel => "unknown_edge_label",
            ValidationErrorKind::NotASequence => "not_a_sequence",
            ValidationErrorKind::NotAMapping => "not_a_mapping",
            ValidationErrorKind::MissingId => "missing_id",
            ValidationErrorKind::MissingEndpoint => "missing_endpoint",
            ValidationErrorKind::MissingRequired => "missing_required",
            ValidationErrorKind::TypeMismatch => "type_mismatch",
        }
    }
}

/// The entity a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Payload,
    Vertex,
    Edge,
}

impl EntityKind {
    fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Payload => "payload",
            EntityKind::Vertex => "vertex",
            EntityKind::Edge => "edge",
        }
    }
}

/// A single validation error with enough context to locate the offending
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub entity: EntityKind,
    pub label: String,
    pub index: Option<usize>,
    pub property: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationError {
    /// Formats as `<entity-kind> <label> at index <i>: <message> (property: <p>)`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}: {}", self.entity.as_str(), self.message)?;
        } else {
            write!(f, "{} {}", self.entity.as_str(), self.label)?;
            if let Some(index) = self.index {
                write!(f, " at index {}", index)?;
            }
            write!(f, ": {}", self.message)?;
        }
        if let Some(property) = &self.property {
            write!(f, " (property: {})", property)?;
        }
        Ok(())
    }
}

/// The validator's verdict: structural/type errors plus advisory warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors rendered in the documented string format.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Validates a `GraphData` payload against a `Schema`.
pub struct DataValidator<'a> {
    schema: &'a Schema,
}

impl<'a> DataValidator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Validate the payload. Deterministic and side-effect free; runs in
    /// O(N) over the total record count.
    pub fn validate(&self, data: &GraphData) -> ValidationReport {
        let mut report = ValidationReport::default();

        match &data.vertices {
            Some(vertices) => {
                for (label, value) in vertices.iter() {
                    self.validate_vertex_label(label, value, &mut report);
                }
            }
            None => report.errors.push(ValidationError {
                kind: ValidationErrorKind::MissingVertices,
                entity: EntityKind::Payload,
                label: String::new(),
                index: None,
                property: None,
                message: "Payload has no vertices section".to_string(),
            }),
        }

        match &data.edges {
            Some(edges) => {
                // Staged vertex IDs per label, built once and shared across
                // edge labels.
                let staged_ids = staged_vertex_ids(data);
                for (label, value) in edges.iter() {
                    self.validate_edge_label(label, value, &staged_ids, &mut report);
                }
            }
            None => report
                .warnings
                .push("Payload has no edges section".to_string()),
        }

        report
    }

    fn validate_vertex_label(&self, label: &str, value: &JsonValue, report: &mut ValidationReport) {
        let Some(def) = self.schema.vertex_def(label) else {
            report.errors.push(ValidationError {
                kind: ValidationErrorKind::UnknownVertexLabel,
                entity: EntityKind::Vertex,
                label: label.to_string(),
                index: None,
                property: None,
                message: "Unknown vertex label".to_string(),
            });
            return;
        };

        let Some(records) = value.as_array() else {
            report.errors.push(ValidationError {
                kind: ValidationErrorKind::NotASequence,
                entity: EntityKind::Vertex,
                label: label.to_string(),
                index: None,
                property: None,
                message: "Expected an array of records".to_string(),
            });
            return;
        };

        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();

        for (index, value) in records.iter().enumerate() {
            let Some(record) = value.as_object() else {
                report.errors.push(ValidationError {
                    kind: ValidationErrorKind::NotAMapping,
                    entity: EntityKind::Vertex,
                    label: label.to_string(),
                    index: Some(index),
                    property: None,
                    message: "Record is not a mapping".to_string(),
                });
                continue;
            };

            match record.get("id").and_then(id_string) {
                Some(id) => {
                    if !seen_ids.insert(id.clone()) && !duplicates.contains(&id) {
                        duplicates.push(id);
                    }
                }
                None => report.errors.push(ValidationError {
                    kind: ValidationErrorKind::MissingId,
                    entity: EntityKind::Vertex,
                    label: label.to_string(),
                    index: Some(index),
                    property: Some("id".to_string()),
                    message: "Missing required property: id".to_string(),
                }),
            }

            self.check_required_props(EntityKind::Vertex, label, index, def, record, report);
            self.check_present_props(
                EntityKind::Vertex,
                label,
                index,
                &def.properties,
                RESERVED_VERTEX_PROPS,
                record,
                report,
            );
        }

        if !duplicates.is_empty() {
            for id in &duplicates {
                report
                    .warnings
                    .push(format!("Duplicate vertex ID: {} in type {}", id, label));
            }
            report.warnings.push(format!(
                "{} duplicate vertex ID(s) in type {}; later records overwrite earlier ones",
                duplicates.len(),
                label
            ));
        }
    }

    fn validate_edge_label(
        &self,
        label: &str,
        value: &JsonValue,
        staged_ids: &HashMap<String, HashSet<String>>,
        report: &mut ValidationReport,
    ) {
        let Some(def) = self.schema.edge_def(label) else {
            report.errors.push(ValidationError {
                kind: ValidationErrorKind::UnknownEdgeLabel,
                entity: EntityKind::Edge,
                label: label.to_string(),
                index: None,
                property: None,
                message: "Unknown edge label".to_string(),
            });
            return;
        };

        let Some(records) = value.as_array() else {
            report.errors.push(ValidationError {
                kind: ValidationErrorKind::NotASequence,
                entity: EntityKind::Edge,
                label: label.to_string(),
                index: None,
                property: None,
                message: "Expected an array of records".to_string(),
            });
            return;
        };

        for (index, value) in records.iter().enumerate() {
            let Some(record) = value.as_object() else {
                report.errors.push(ValidationError {
                    kind: ValidationErrorKind::NotAMapping,
                    entity: EntityKind::Edge,
                    label: label.to_string(),
                    index: Some(index),
                    property: None,
                    message: "Record is not a mapping".to_string(),
                });
                continue;
            };

            for (endpoint, endpoint_label) in
                [("from", &def.from_label), ("to", &def.to_label)]
            {
                match record.get(endpoint).and_then(id_string) {
                    Some(id) => {
                        // Only warn when the payload actually stages records
                        // for the endpoint's vertex label; full enforcement
                        // happens against the live graph at load time.
                        if let Some(ids) = staged_ids.get(endpoint_label.as_str()) {
                            if !ids.contains(&id) {
                                report.warnings.push(format!(
                                    "edge {} at index {}: {} '{}' does not match any {} vertex in the payload",
                                    label, index, endpoint, id, endpoint_label
                                ));
                            }
                        }
                    }
                    None => report.errors.push(ValidationError {
                        kind: ValidationErrorKind::MissingEndpoint,
                        entity: EntityKind::Edge,
                        label: label.to_string(),
                        index: Some(index),
                        property: Some(endpoint.to_string()),
                        message: format!("Missing required property: {}", endpoint),
                    }),
                }
            }

            self.check_edge_required_props(label, index, def, record, report);
            self.check_present_props(
                EntityKind::Edge,
                label,
                index,
                &def.properties,
                RESERVED_EDGE_PROPS,
                record,
                report,
            );
        }
    }

    fn check_required_props(
        &self,
        entity: EntityKind,
        label: &str,
        index: usize,
        def: &VertexDef,
        record: &Record,
        report: &mut ValidationReport,
    ) {
        let mut required: Vec<&str> = def
            .properties
            .iter()
            .filter(|(name, prop)| prop.required && *name != "id")
            .map(|(name, _)| name)
            .collect();
        for name in &def.required {
            if name != "id" && !required.contains(&name.as_str()) {
                required.push(name);
            }
        }

        for name in required {
            if !record.contains_key(name) {
                report.errors.push(ValidationError {
                    kind: ValidationErrorKind::MissingRequired,
                    entity,
                    label: label.to_string(),
                    index: Some(index),
                    property: Some(name.to_string()),
                    message: format!("Missing required property: {}", name),
                });
            }
        }
    }

    fn check_edge_required_props(
        &self,
        label: &str,
        index: usize,
        def: &EdgeDef,
        record: &Record,
        report: &mut ValidationReport,
    ) {
        for (name, prop) in def.properties.iter() {
            if prop.required && !RESERVED_EDGE_PROPS.contains(&name) && !record.contains_key(name) {
                report.errors.push(ValidationError {
                    kind: ValidationErrorKind::MissingRequired,
                    entity: EntityKind::Edge,
                    label: label.to_string(),
                    index: Some(index),
                    property: Some(name.to_string()),
                    message: format!("Missing required property: {}", name),
                });
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_present_props(
        &self,
        entity: EntityKind,
        label: &str,
        index: usize,
        declared: &crate::types::OrderedMap<crate::schema::PropDef>,
        reserved: &[&str],
        record: &Record,
        report: &mut ValidationReport,
    ) {
        for (name, value) in record {
            if reserved.contains(&name.as_str()) {
                continue;
            }
            match declared.get(name) {
                Some(prop) => {
                    if value.is_null() {
                        continue;
                    }
                    if !type_matches(prop.prop_type, value) {
                        report.errors.push(ValidationError {
                            kind: ValidationErrorKind::TypeMismatch,
                            entity,
                            label: label.to_string(),
                            index: Some(index),
                            property: Some(name.to_string()),
                            message: format!(
                                "Property '{}' expected {}, got {}",
                                name,
                                prop.prop_type,
                                json_type_name(value)
                            ),
                        });
                    }
                }
                None => report.warnings.push(format!(
                    "Unknown property '{}' on {} {} at index {}",
                    name,
                    entity.as_str(),
                    label,
                    index
                )),
            }
        }
    }
}

/// Collect the coerced `id`s of every staged vertex record, per label.
fn staged_vertex_ids(data: &GraphData) -> HashMap<String, HashSet<String>> {
    let mut ids: HashMap<String, HashSet<String>> = HashMap::new();
    let Some(vertices) = &data.vertices else {
        return ids;
    };
    for (label, value) in vertices.iter() {
        let Some(records) = value.as_array() else {
            continue;
        };
        let set = ids.entry(label.to_string()).or_default();
        for record in records.iter().filter_map(|v| v.as_object()) {
            if let Some(id) = record.get("id").and_then(id_string) {
                set.insert(id);
            }
        }
    }
    ids
}

/// Declared-type acceptance check. `null` is handled by the caller.
fn type_matches(prop_type: PropType, value: &JsonValue) -> bool {
    match prop_type {
        PropType::String => value.is_string(),
        PropType::Number => value.as_f64().is_some_and(f64::is_finite),
        PropType::Boolean => value.is_boolean(),
        PropType::Object => value.is_object(),
        PropType::Array => value.is_array(),
        PropType::Any | PropType::Custom => !value.is_null(),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
