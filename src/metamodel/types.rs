use std::collections::{BTreeMap, BTreeSet};

use crate::model::value_objects::Iri;

use super::attributes::{AttributeDescriptor, AttributeKind, IdentifierDescriptor};

/// Declarative description of one mapped class, fed to the metamodel builder.
///
/// Declarations are produced by code generation or configuration loading and
/// carry only locally declared members; supertype members are resolved during
/// the build.
#[derive(Clone, Debug)]
pub struct TypeMapping {
    name: String,
    class_iri: Iri,
    abstract_type: bool,
    supertypes: BTreeSet<String>,
    attributes: Vec<AttributeDescriptor>,
    identifier: Option<IdentifierDescriptor>,
}

impl TypeMapping {
    /// Creates a mapping for a concrete managed class.
    #[must_use]
    pub fn new(name: impl Into<String>, class_iri: Iri) -> Self {
        Self {
            name: name.into(),
            class_iri,
            abstract_type: false,
            supertypes: BTreeSet::new(),
            attributes: Vec::new(),
            identifier: None,
        }
    }

    /// Marks the type as abstract; abstract types exist only as supertypes
    /// and are never instantiated directly.
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.abstract_type = true;
        self
    }

    /// Adds a supertype link (class or interface parent).
    #[must_use]
    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.insert(supertype.into());
        self
    }

    /// Declares an attribute locally on this type.
    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declares the identifier field.
    #[must_use]
    pub fn with_identifier(mut self, identifier: IdentifierDescriptor) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ontology class IRI.
    #[must_use]
    pub fn class_iri(&self) -> &Iri {
        &self.class_iri
    }

    /// Returns whether the type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.abstract_type
    }

    /// Returns the direct supertype names.
    #[must_use]
    pub fn supertypes(&self) -> &BTreeSet<String> {
        &self.supertypes
    }

    /// Returns the locally declared attributes.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Returns the locally declared identifier.
    #[must_use]
    pub fn identifier(&self) -> Option<&IdentifierDescriptor> {
        self.identifier.as_ref()
    }
}

/// Fully resolved managed type, immutable after the metamodel build.
#[derive(Clone, Debug)]
pub struct ManagedType {
    name: String,
    class_iri: Iri,
    abstract_type: bool,
    supertypes: BTreeSet<String>,
    ancestors: BTreeSet<String>,
    attributes: BTreeMap<String, AttributeDescriptor>,
    identifier: Option<IdentifierDescriptor>,
    types_attribute: Option<String>,
    properties_attribute: Option<String>,
    has_inferred: bool,
}

impl ManagedType {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        class_iri: Iri,
        abstract_type: bool,
        supertypes: BTreeSet<String>,
        ancestors: BTreeSet<String>,
        attributes: BTreeMap<String, AttributeDescriptor>,
        identifier: Option<IdentifierDescriptor>,
    ) -> Self {
        let types_attribute = attributes
            .values()
            .find(|att| matches!(att.kind(), AttributeKind::Types))
            .map(|att| att.name().to_owned());
        let properties_attribute = attributes
            .values()
            .find(|att| matches!(att.kind(), AttributeKind::Properties))
            .map(|att| att.name().to_owned());
        let has_inferred = attributes.values().any(AttributeDescriptor::is_inferred);
        Self {
            name,
            class_iri,
            abstract_type,
            supertypes,
            ancestors,
            attributes,
            identifier,
            types_attribute,
            properties_attribute,
            has_inferred,
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ontology class IRI.
    #[must_use]
    pub fn class_iri(&self) -> &Iri {
        &self.class_iri
    }

    /// Returns whether the type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.abstract_type
    }

    /// Returns the direct supertype names.
    #[must_use]
    pub fn supertypes(&self) -> &BTreeSet<String> {
        &self.supertypes
    }

    /// Returns the transitive supertype closure.
    #[must_use]
    pub fn ancestors(&self) -> &BTreeSet<String> {
        &self.ancestors
    }

    /// Returns whether this type is the named type or one of its subtypes.
    #[must_use]
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.name == type_name || self.ancestors.contains(type_name)
    }

    /// Returns all attributes, declared and inherited.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, AttributeDescriptor> {
        &self.attributes
    }

    /// Looks up one attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(name)
    }

    /// Returns the resolved identifier descriptor; present on every concrete
    /// type.
    #[must_use]
    pub fn identifier(&self) -> Option<&IdentifierDescriptor> {
        self.identifier.as_ref()
    }

    /// Returns the name of the types attribute, if declared.
    #[must_use]
    pub fn types_attribute(&self) -> Option<&str> {
        self.types_attribute.as_deref()
    }

    /// Returns the name of the properties attribute, if declared.
    #[must_use]
    pub fn properties_attribute(&self) -> Option<&str> {
        self.properties_attribute.as_deref()
    }

    /// Returns whether any attribute may hold reasoner-derived values.
    #[must_use]
    pub fn has_inferred_attributes(&self) -> bool {
        self.has_inferred
    }

    /// Returns the predicates declared by regular attributes of this type.
    #[must_use]
    pub fn declared_predicates(&self) -> BTreeSet<&Iri> {
        self.attributes
            .values()
            .filter_map(AttributeDescriptor::predicate)
            .collect()
    }
}
