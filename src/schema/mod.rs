//! Graph schema model.
//!
//! A `Schema` declares the vertex and edge labels a graph may contain, the
//! properties each label carries, and the endpoint labels of every edge
//! type. It is read-only configuration: the validator checks payloads
//! against it and the Cypher compiler derives creation templates from it.

mod definition;

pub use definition::{
    is_identifier, EdgeDef, PropDef, PropType, Schema, SchemaError, VertexDef,
    RESERVED_EDGE_PROPS, RESERVED_VERTEX_PROPS,
};
