//! Core schema definition types.
//!
//! Schemas are declarative JSON documents:
//!
//! ```json
//! {
//!   "version": "1.0.0",
//!   "vertices": {
//!     "Person": {
//!       "properties": {"id": "string", "name": {"type": "string", "required": true}}
//!     }
//!   },
//!   "edges": {
//!     "WORKS_AT": {
//!       "fromLabel": "Person",
//!       "toLabel": "Company",
//!       "properties": {"since": "number"}
//!     }
//!   }
//! }
//! ```
//!
//! Property declaration order is preserved: the Cypher compiler emits
//! property maps in declared order, which keeps generated statements
//! deterministic.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::types::OrderedMap;

/// Property names with fixed semantics on vertex records.
pub const RESERVED_VERTEX_PROPS: &[&str] = &["id"];

/// Property names with fixed semantics on edge records.
pub const RESERVED_EDGE_PROPS: &[&str] = &["id", "from", "to"];

/// Schema loading and invariant errors.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema file '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Invalid schema JSON: {message}")]
    Parse { message: String },

    #[error("Edge '{edge}' references unknown vertex label '{label}' as {side}")]
    UnknownEndpointLabel {
        edge: String,
        side: &'static str,
        label: String,
    },

    #[error("Invalid {kind} name '{name}': must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier { kind: &'static str, name: String },

    #[error("Reserved property '{name}' on label '{label}' must be string, number, or any")]
    ReservedProperty { label: String, name: String },
}

/// Declared property types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Any,
    Custom,
}

impl fmt::Display for PropType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PropType::String => "string",
            PropType::Number => "number",
            PropType::Boolean => "boolean",
            PropType::Object => "object",
            PropType::Array => "array",
            PropType::Any => "any",
            PropType::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A property declaration. Accepts a bare type name (`"string"`) or the
/// full object form (`{"type": "string", "required": true}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PropDefRepr")]
pub struct PropDef {
    #[serde(rename = "type")]
    pub prop_type: PropType,
    pub required: bool,
}

impl PropDef {
    pub fn new(prop_type: PropType) -> Self {
        Self {
            prop_type,
            required: false,
        }
    }

    pub fn required(prop_type: PropType) -> Self {
        Self {
            prop_type,
            required: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropDefRepr {
    Shorthand(PropType),
    Full {
        #[serde(rename = "type")]
        prop_type: PropType,
        #[serde(default)]
        required: bool,
    },
}

impl From<PropDefRepr> for PropDef {
    fn from(repr: PropDefRepr) -> Self {
        match repr {
            PropDefRepr::Shorthand(prop_type) => PropDef::new(prop_type),
            PropDefRepr::Full {
                prop_type,
                required,
            } => PropDef {
                prop_type,
                required,
            },
        }
    }
}

/// A vertex label definition. `id` is implicitly required even when not
/// declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexDef {
    #[serde(default)]
    pub properties: OrderedMap<PropDef>,

    /// Property names required in addition to any `required` flags on the
    /// declarations themselves.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl VertexDef {
    /// Whether a property must be present on every record of this label.
    pub fn is_required(&self, name: &str) -> bool {
        if name == "id" {
            return true;
        }
        self.required.iter().any(|r| r == name)
            || self.properties.get(name).is_some_and(|p| p.required)
    }

    /// Declared properties excluding the reserved `id`, in declared order.
    pub fn declared_props(&self) -> impl Iterator<Item = (&str, &PropDef)> {
        self.properties
            .iter()
            .filter(|(name, _)| !RESERVED_VERTEX_PROPS.contains(name))
    }
}

/// An edge label definition. `from` and `to` on records are implicit
/// references to vertex IDs of `from_label`/`to_label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDef {
    #[serde(default)]
    pub properties: OrderedMap<PropDef>,

    #[serde(rename = "fromLabel", deserialize_with = "scalar_label")]
    pub from_label: String,

    #[serde(rename = "toLabel", deserialize_with = "scalar_label")]
    pub to_label: String,
}

impl EdgeDef {
    /// Declared properties excluding the reserved `id`/`from`/`to`, in
    /// declared order.
    pub fn declared_props(&self) -> impl Iterator<Item = (&str, &PropDef)> {
        self.properties
            .iter()
            .filter(|(name, _)| !RESERVED_EDGE_PROPS.contains(name))
    }
}

/// Deserialize an endpoint label, rejecting list forms explicitly instead of
/// coercing them.
fn scalar_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct ScalarLabelVisitor;

    impl<'de> serde::de::Visitor<'de> for ScalarLabelVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a single vertex label")
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_seq<A: serde::de::SeqAccess<'de>>(self, _seq: A) -> Result<String, A::Error> {
            Err(serde::de::Error::custom(
                "expected a single vertex label, not a list",
            ))
        }
    }

    deserializer.deserialize_any(ScalarLabelVisitor)
}

/// A complete graph schema: vertex and edge label definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<JsonValue>,

    #[serde(default)]
    pub vertices: OrderedMap<VertexDef>,

    #[serde(default)]
    pub edges: OrderedMap<EdgeDef>,
}

impl Schema {
    /// Parse and check a schema from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let schema: Schema = serde_json::from_str(json).map_err(|e| SchemaError::Parse {
            message: e.to_string(),
        })?;
        schema.check()?;
        Ok(schema)
    }

    /// Parse and check a schema from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    pub fn vertex_def(&self, label: &str) -> Option<&VertexDef> {
        self.vertices.get(label)
    }

    pub fn edge_def(&self, label: &str) -> Option<&EdgeDef> {
        self.edges.get(label)
    }

    pub fn known_vertex_labels(&self) -> impl Iterator<Item = &str> {
        self.vertices.keys()
    }

    pub fn known_edge_labels(&self) -> impl Iterator<Item = &str> {
        self.edges.keys()
    }

    /// Check schema invariants: identifier-safe names, resolvable edge
    /// endpoints, and sane reserved-property declarations. Labels and
    /// property names are spliced into Cypher templates, so anything that is
    /// not a plain identifier is rejected here rather than escaped later.
    pub fn check(&self) -> Result<(), SchemaError> {
        for (label, def) in self.vertices.iter() {
            check_identifier("vertex label", label)?;
            for (name, prop) in def.properties.iter() {
                check_identifier("property", name)?;
                if RESERVED_VERTEX_PROPS.contains(&name) {
                    check_reserved(label, name, prop)?;
                }
            }
            for name in &def.required {
                check_identifier("property", name)?;
            }
        }

        for (label, def) in self.edges.iter() {
            check_identifier("edge label", label)?;
            for (name, prop) in def.properties.iter() {
                check_identifier("property", name)?;
                if RESERVED_EDGE_PROPS.contains(&name) {
                    check_reserved(label, name, prop)?;
                }
            }
            if self.vertices.get(&def.from_label).is_none() {
                return Err(SchemaError::UnknownEndpointLabel {
                    edge: label.to_string(),
                    side: "fromLabel",
                    label: def.from_label.clone(),
                });
            }
            if self.vertices.get(&def.to_label).is_none() {
                return Err(SchemaError::UnknownEndpointLabel {
                    edge: label.to_string(),
                    side: "toLabel",
                    label: def.to_label.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Whether a string is a plain identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

fn check_reserved(label: &str, name: &str, prop: &PropDef) -> Result<(), SchemaError> {
    match prop.prop_type {
        PropType::String | PropType::Number | PropType::Any => Ok(()),
        _ => Err(SchemaError::ReservedProperty {
            label: label.to_string(),
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people_schema() -> Schema {
        Schema::from_json_str(
            r#"{
                "version": "1.0.0",
                "vertices": {
                    "Person": {
                        "properties": {
                            "id": "string",
                            "name": {"type": "string", "required": true},
                            "age": "number"
                        }
                    },
                    "Company": {
                        "properties": {
                            "id": "string",
                            "name": {"type": "string", "required": true},
                            "founded": "number"
                        }
                    }
                },
                "edges": {
                    "WORKS_AT": {
                        "fromLabel": "Person",
                        "toLabel": "Company",
                        "properties": {"since": "number", "position": "string"}
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_full_schema() {
        let schema = people_schema();
        assert_eq!(schema.vertices.len(), 2);
        assert_eq!(schema.edges.len(), 1);
        let works_at = schema.edge_def("WORKS_AT").unwrap();
        assert_eq!(works_at.from_label, "Person");
        assert_eq!(works_at.to_label, "Company");
    }

    #[test]
    fn test_prop_shorthand_and_full_forms() {
        let schema = people_schema();
        let person = schema.vertex_def("Person").unwrap();
        assert_eq!(
            person.properties.get("age"),
            Some(&PropDef::new(PropType::Number))
        );
        assert_eq!(
            person.properties.get("name"),
            Some(&PropDef::required(PropType::String))
        );
    }

    #[test]
    fn test_property_declaration_order_preserved() {
        let schema = people_schema();
        let person = schema.vertex_def("Person").unwrap();
        let names: Vec<&str> = person.properties.keys().collect();
        assert_eq!(names, vec!["id", "name", "age"]);
    }

    #[test]
    fn test_declared_props_skip_reserved() {
        let schema = people_schema();
        let person = schema.vertex_def("Person").unwrap();
        let names: Vec<&str> = person.declared_props().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["name", "age"]);
    }

    #[test]
    fn test_id_implicitly_required() {
        let schema = people_schema();
        let person = schema.vertex_def("Person").unwrap();
        assert!(person.is_required("id"));
        assert!(person.is_required("name"));
        assert!(!person.is_required("age"));
    }

    #[test]
    fn test_required_list_supplements_flags() {
        let schema = Schema::from_json_str(
            r#"{
                "vertices": {
                    "Node": {"properties": {"tag": "string"}, "required": ["tag"]}
                }
            }"#,
        )
        .unwrap();
        assert!(schema.vertex_def("Node").unwrap().is_required("tag"));
    }

    #[test]
    fn test_list_endpoint_label_rejected() {
        let result = Schema::from_json_str(
            r#"{
                "vertices": {"Person": {}},
                "edges": {
                    "KNOWS": {"fromLabel": ["Person"], "toLabel": "Person"}
                }
            }"#,
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("expected a single vertex label, not a list"));
    }

    #[test]
    fn test_unknown_endpoint_label_rejected() {
        let result = Schema::from_json_str(
            r#"{
                "vertices": {"Person": {}},
                "edges": {
                    "WORKS_AT": {"fromLabel": "Person", "toLabel": "Company"}
                }
            }"#,
        );
        match result {
            Err(SchemaError::UnknownEndpointLabel { edge, side, label }) => {
                assert_eq!(edge, "WORKS_AT");
                assert_eq!(side, "toLabel");
                assert_eq!(label, "Company");
            }
            other => panic!("Expected UnknownEndpointLabel, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_label_identifier_rejected() {
        let result = Schema::from_json_str(r#"{"vertices": {"Bad Label": {}}}"#);
        assert!(matches!(
            result,
            Err(SchemaError::InvalidIdentifier { kind: "vertex label", .. })
        ));
    }

    #[test]
    fn test_invalid_property_identifier_rejected() {
        let result = Schema::from_json_str(
            r#"{"vertices": {"Person": {"properties": {"first name": "string"}}}}"#,
        );
        assert!(matches!(
            result,
            Err(SchemaError::InvalidIdentifier { kind: "property", .. })
        ));
    }

    #[test]
    fn test_reserved_property_must_be_scalar() {
        let result = Schema::from_json_str(
            r#"{"vertices": {"Person": {"properties": {"id": "object"}}}}"#,
        );
        assert!(matches!(result, Err(SchemaError::ReservedProperty { .. })));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("Person"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("WORKS_AT"));
        assert!(is_identifier("v2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("quo'te"));
    }

    #[test]
    fn test_lookup_operations() {
        let schema = people_schema();
        assert!(schema.vertex_def("Person").is_some());
        assert!(schema.vertex_def("Ghost").is_none());
        assert!(schema.edge_def("WORKS_AT").is_some());
        assert!(schema.edge_def("KNOWS").is_none());
        let labels: Vec<&str> = schema.known_vertex_labels().collect();
        assert_eq!(labels, vec!["Person", "Company"]);
        let labels: Vec<&str> = schema.known_edge_labels().collect();
        assert_eq!(labels, vec!["WORKS_AT"]);
    }

    #[test]
    fn test_from_json_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"vertices": {"Person": {}}}"#).unwrap();
        file.flush().unwrap();

        let schema = Schema::from_json_file(file.path()).unwrap();
        assert!(schema.vertex_def("Person").is_some());
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = Schema::from_json_file(Path::new("/nonexistent/schema.json"));
        assert!(matches!(result, Err(SchemaError::Io { .. })));
    }

    #[test]
    fn test_validate_twice_is_stable() {
        let schema = people_schema();
        assert!(schema.check().is_ok());
        assert!(schema.check().is_ok());
    }
}
