use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::model::value_objects::{Iri, Value};

/// How the values of a sequence attribute are ordered in the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceLayout {
    /// Head pointer through the attribute predicate, then one next-element
    /// link per node.
    Linked {
        /// Predicate linking each element to its successor.
        next: Iri,
    },
    /// One statement per element through the attribute predicate, ordered by
    /// an integer index asserted on each element.
    Indexed {
        /// Predicate carrying the zero-based position of each element.
        index: Iri,
    },
}

/// Persistent attribute kind, fixed at metamodel build time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    /// Literal-valued property.
    Data,
    /// Resource-valued property referencing another managed instance.
    Object,
    /// Annotation property accepting literals or resources.
    Annotation,
    /// The set of asserted resource classes beyond the primary one.
    Types,
    /// Residual predicate–value pairs not declared elsewhere on the type.
    Properties,
    /// Ordered chain of resources.
    Sequence(SequenceLayout),
    /// Value computed by a fixed native query parametrized by the instance
    /// identifier; reconstructed but never written back.
    Query(String),
}

/// Cardinality of an attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one value.
    Singular,
    /// Unordered values.
    Set,
    /// Ordered values.
    List,
}

/// When an attribute's values are fetched.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FetchType {
    /// Loaded during reconstruction.
    #[default]
    Eager,
    /// Left unloaded until explicitly requested through the session.
    Lazy,
}

/// Minimum/maximum occurrence constraint on an attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParticipationConstraint {
    min: u32,
    max: Option<u32>,
}

impl ParticipationConstraint {
    /// Creates a constraint with explicit bounds.
    #[must_use]
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Shorthand for `min = 1`, no upper bound.
    #[must_use]
    pub fn required() -> Self {
        Self::new(1, None)
    }

    /// Returns the minimum occurrence.
    #[must_use]
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Returns the maximum occurrence, if bounded.
    #[must_use]
    pub fn max(&self) -> Option<u32> {
        self.max
    }
}

/// Failure raised by a [`ValueConverter`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("value conversion failed: {0}")]
pub struct ConversionError(pub String);

/// Bidirectional, side-effect-free conversion between a field value and its
/// axiom representation.
///
/// Implementations must be exact in both directions; when no converter is
/// registered, values round-trip through their lexical datatype unchanged.
pub trait ValueConverter: Send + Sync {
    /// Stable converter name, used for structural descriptor equality.
    fn name(&self) -> &str;

    /// Converts a field value into its axiom representation.
    fn to_axiom_value(&self, value: &Value) -> Result<Value, ConversionError>;

    /// Converts an axiom value into its field representation.
    fn to_field_value(&self, value: &Value) -> Result<Value, ConversionError>;
}

/// Immutable description of one mapped field, resolved once at metamodel
/// build time.
#[derive(Clone)]
pub struct AttributeDescriptor {
    name: String,
    kind: AttributeKind,
    cardinality: Cardinality,
    predicate: Option<Iri>,
    target: Option<String>,
    inferred: bool,
    fetch: FetchType,
    language: Option<String>,
    constraint: Option<ParticipationConstraint>,
    converter: Option<Arc<dyn ValueConverter>>,
}

impl AttributeDescriptor {
    fn base(name: impl Into<String>, kind: AttributeKind, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            kind,
            cardinality,
            predicate: None,
            target: None,
            inferred: false,
            fetch: FetchType::default(),
            language: None,
            constraint: None,
            converter: None,
        }
    }

    /// Declares a singular data attribute.
    #[must_use]
    pub fn data(name: impl Into<String>, predicate: Iri) -> Self {
        let mut descriptor = Self::base(name, AttributeKind::Data, Cardinality::Singular);
        descriptor.predicate = Some(predicate);
        descriptor
    }

    /// Declares a singular annotation attribute.
    #[must_use]
    pub fn annotation(name: impl Into<String>, predicate: Iri) -> Self {
        let mut descriptor = Self::base(name, AttributeKind::Annotation, Cardinality::Singular);
        descriptor.predicate = Some(predicate);
        descriptor
    }

    /// Declares a singular object attribute targeting a managed type.
    #[must_use]
    pub fn object(name: impl Into<String>, predicate: Iri, target: impl Into<String>) -> Self {
        let mut descriptor = Self::base(name, AttributeKind::Object, Cardinality::Singular);
        descriptor.predicate = Some(predicate);
        descriptor.target = Some(target.into());
        descriptor
    }

    /// Declares the types attribute of a managed type.
    #[must_use]
    pub fn types(name: impl Into<String>) -> Self {
        Self::base(name, AttributeKind::Types, Cardinality::Set)
    }

    /// Declares the properties attribute of a managed type.
    #[must_use]
    pub fn properties(name: impl Into<String>) -> Self {
        Self::base(name, AttributeKind::Properties, Cardinality::Set)
    }

    /// Declares an ordered sequence attribute targeting a managed type.
    #[must_use]
    pub fn sequence(
        name: impl Into<String>,
        predicate: Iri,
        layout: SequenceLayout,
        target: impl Into<String>,
    ) -> Self {
        let mut descriptor =
            Self::base(name, AttributeKind::Sequence(layout), Cardinality::List);
        descriptor.predicate = Some(predicate);
        descriptor.target = Some(target.into());
        descriptor
    }

    /// Declares a query-derived attribute backed by a fixed native query.
    #[must_use]
    pub fn query(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self::base(
            name,
            AttributeKind::Query(query.into()),
            Cardinality::Singular,
        )
    }

    /// Switches the attribute to unordered plural cardinality.
    #[must_use]
    pub fn plural(mut self) -> Self {
        self.cardinality = Cardinality::Set;
        self
    }

    /// Flags the attribute as possibly reasoner-derived.
    #[must_use]
    pub fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }

    /// Defers loading of the attribute until explicitly requested.
    #[must_use]
    pub fn lazy(mut self) -> Self {
        self.fetch = FetchType::Lazy;
        self
    }

    /// Tags plain string values with the supplied language on write.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Attaches a participation constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: ParticipationConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Registers a value converter.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Returns the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attribute kind.
    #[must_use]
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    /// Returns the cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns the mapped predicate, absent for types, properties and
    /// query-derived attributes.
    #[must_use]
    pub fn predicate(&self) -> Option<&Iri> {
        self.predicate.as_ref()
    }

    /// Returns the managed type referenced by object and sequence attributes.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns whether values may be reasoner-derived.
    #[must_use]
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// Returns the fetch policy.
    #[must_use]
    pub fn fetch(&self) -> FetchType {
        self.fetch
    }

    /// Returns the language tag applied to plain string values.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the participation constraint.
    #[must_use]
    pub fn constraint(&self) -> Option<&ParticipationConstraint> {
        self.constraint.as_ref()
    }

    /// Returns the registered value converter.
    #[must_use]
    pub fn converter(&self) -> Option<&Arc<dyn ValueConverter>> {
        self.converter.as_ref()
    }

    /// Returns whether an empty value violates the participation constraint.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.constraint.map_or(false, |c| c.min() > 0)
    }

    fn converter_name(&self) -> Option<&str> {
        self.converter.as_deref().map(ValueConverter::name)
    }
}

impl fmt::Debug for AttributeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("cardinality", &self.cardinality)
            .field("predicate", &self.predicate)
            .field("target", &self.target)
            .field("inferred", &self.inferred)
            .field("fetch", &self.fetch)
            .field("language", &self.language)
            .field("constraint", &self.constraint)
            .field("converter", &self.converter_name())
            .finish()
    }
}

/// Structural equality: all static fields plus the converter name. Two
/// inherited declarations of the same attribute are compatible exactly when
/// they are equal under this relation.
impl PartialEq for AttributeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.cardinality == other.cardinality
            && self.predicate == other.predicate
            && self.target == other.target
            && self.inferred == other.inferred
            && self.fetch == other.fetch
            && self.language == other.language
            && self.constraint == other.constraint
            && self.converter_name() == other.converter_name()
    }
}

impl Eq for AttributeDescriptor {}

/// Maps a field to the resource's own identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierDescriptor {
    name: String,
    generated: bool,
}

impl IdentifierDescriptor {
    /// Declares a caller-supplied identifier field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generated: false,
        }
    }

    /// Marks the identifier as generated by the storage backend at persist
    /// time.
    #[must_use]
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    /// Returns the identifier field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the identifier is backend-generated.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.generated
    }
}
