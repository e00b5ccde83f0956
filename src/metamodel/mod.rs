//! Static description of the managed types: their identifiers, attributes and
//! supertype graphs.
//!
//! The metamodel is built once per persistence unit, validated eagerly, and
//! treated as immutable afterwards so it can be shared freely across
//! concurrent units of work.

pub mod attributes;
pub mod builder;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;

use crate::model::value_objects::{Iri, IriError};

pub use attributes::{
    AttributeDescriptor, AttributeKind, Cardinality, ConversionError, FetchType,
    IdentifierDescriptor, ParticipationConstraint, SequenceLayout, ValueConverter,
};
pub use builder::MetamodelBuilder;
pub use types::{ManagedType, TypeMapping};

/// Errors raised while assembling or querying the metamodel.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MetamodelError {
    /// The same type name was registered twice.
    #[error("managed type `{0}` is declared more than once")]
    DuplicateType(String),
    /// A lookup referenced a type that is not managed.
    #[error("`{type_name}` is not a known managed type in this persistence unit")]
    UnknownType { type_name: String },
    /// A mapping names a supertype that is not registered.
    #[error("type `{type_name}` references unknown supertype `{supertype}`")]
    UnknownSupertype {
        type_name: String,
        supertype: String,
    },
    /// The supertype graph contains a cycle.
    #[error("supertype cycle involving `{type_name}`")]
    SupertypeCycle { type_name: String },
    /// The same attribute name was declared twice locally.
    #[error("attribute `{attribute}` is declared twice on `{type_name}`")]
    DuplicateAttribute {
        type_name: String,
        attribute: String,
    },
    /// Two unrelated supertypes contribute incompatible declarations of the
    /// same attribute.
    #[error("attribute `{attribute}` inherited by `{type_name}` from incompatible supertype declarations")]
    AmbiguousAttribute {
        type_name: String,
        attribute: String,
    },
    /// A concrete type resolves no identifier declaration.
    #[error("managed type `{type_name}` declares no identifier")]
    MissingIdentifier { type_name: String },
    /// The inheritance chain contributes conflicting identifier declarations.
    #[error("managed type `{type_name}` inherits conflicting identifier declarations")]
    AmbiguousIdentifier { type_name: String },
    /// More than one types attribute in the hierarchy.
    #[error("managed type `{type_name}` declares more than one types attribute")]
    DuplicateTypesAttribute { type_name: String },
    /// More than one properties attribute in the hierarchy.
    #[error("managed type `{type_name}` declares more than one properties attribute")]
    DuplicatePropertiesAttribute { type_name: String },
    /// An object or sequence attribute references an unmapped type.
    #[error("attribute `{attribute}` on `{type_name}` references unmapped type `{target}`")]
    UnknownTargetType {
        type_name: String,
        attribute: String,
        target: String,
    },
    /// An identifier failed IRI validation.
    #[error(transparent)]
    InvalidIri(#[from] IriError),
}

/// Read-only registry of managed types, safe for concurrent read access.
#[derive(Clone, Debug)]
pub struct Metamodel {
    types: BTreeMap<String, Arc<ManagedType>>,
    by_class: BTreeMap<Iri, BTreeSet<String>>,
}

impl Metamodel {
    pub(crate) fn new(
        types: BTreeMap<String, Arc<ManagedType>>,
        by_class: BTreeMap<Iri, BTreeSet<String>>,
    ) -> Self {
        Self { types, by_class }
    }

    /// Returns the managed type with the given name.
    pub fn entity(&self, type_name: &str) -> Result<Arc<ManagedType>, MetamodelError> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| MetamodelError::UnknownType {
                type_name: type_name.to_owned(),
            })
    }

    /// Returns whether the named type is managed.
    #[must_use]
    pub fn is_managed(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Returns the managed types asserting the given ontology class IRI.
    ///
    /// Several types may map the same class; the mapper narrows the set down
    /// during polymorphic resolution.
    #[must_use]
    pub fn mapped_entities(&self, class_iri: &Iri) -> Vec<Arc<ManagedType>> {
        self.by_class
            .get(class_iri)
            .into_iter()
            .flatten()
            .filter_map(|name| self.types.get(name).cloned())
            .collect()
    }

    /// Iterates over every managed type.
    pub fn managed_types(&self) -> impl Iterator<Item = &Arc<ManagedType>> {
        self.types.values()
    }

    /// Returns the named type together with all of its subtypes.
    #[must_use]
    pub fn assignable_types(&self, type_name: &str) -> Vec<Arc<ManagedType>> {
        self.types
            .values()
            .filter(|managed| managed.is_assignable_to(type_name))
            .cloned()
            .collect()
    }
}
