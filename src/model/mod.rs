//! Core graph data model: identifiers, statements, contexts and the dynamic
//! instance representation the mapper operates on.
//!
//! The module keeps only pure value objects, free of persistence and session
//! concerns, so that the mapper, cache and unit of work can share them without
//! coupling.

pub mod axiom;
pub mod descriptor;
pub mod instance;
pub mod namespaces;
pub mod value_objects;

pub use axiom::{rdf_type, Assertion, AssertionKind, Axiom};
pub use descriptor::Descriptor;
pub use instance::{FieldState, FieldValue, Instance};
pub use namespaces::NamespaceResolver;
pub use value_objects::{Iri, IriError, Literal, NamedResource, Value};
