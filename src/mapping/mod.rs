//! Bidirectional conversion between typed instances and graph statements.
//!
//! The mapper orchestrates one attribute strategy per kind and cardinality
//! pair to reconstruct whole instances from an axiom bag, serialize instances
//! for persisting, and compute per-attribute deltas for write-back.

pub mod converters;
pub mod delta;
mod sequences;
mod strategies;

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::error::Error;
use crate::metamodel::attributes::{
    AttributeDescriptor, AttributeKind, Cardinality, ConversionError, FetchType, SequenceLayout,
};
use crate::metamodel::types::ManagedType;
use crate::metamodel::Metamodel;
use crate::model::axiom::Axiom;
use crate::model::descriptor::Descriptor;
use crate::model::instance::{FieldState, FieldValue, Instance};
use crate::model::value_objects::{Iri, IriError, NamedResource, Value};
use crate::session::connector::{ConnectorHandle, QueryBindings};

pub use delta::{compute_delta, extract_entity_axioms, ChangeSet, FieldDelta};

/// Name under which the current instance identifier is bound when executing
/// the native query of a query-derived attribute.
pub const QUERY_SUBJECT_BINDING: &str = "x";

/// Errors raised while converting between instances and statements.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    /// An attribute received more values than its cardinality allows, or a
    /// field value of the wrong shape.
    #[error("attribute `{attribute}` violates its cardinality")]
    CardinalityViolation { attribute: String },
    /// A required attribute had no value at write time.
    #[error("required attribute `{attribute}` has no value")]
    MissingRequiredValue { attribute: String },
    /// An attribute held a value outside its supported shape.
    #[error("attribute `{attribute}` holds values of an unsupported shape")]
    UnsupportedElementShape { attribute: String },
    /// A lookup referenced an attribute the type does not declare.
    #[error("type `{type_name}` declares no attribute `{attribute}`")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },
    /// An instance without identifier reached a write path.
    #[error("instance of `{type_name}` has no identifier")]
    MissingIdentifier { type_name: String },
    /// Several unrelated most specific types match the asserted classes.
    #[error("multiple most specific managed types match resource `{subject}`")]
    AmbiguousEntityType { subject: String },
    /// A working copy modified a reasoner-derived attribute.
    #[error("inferred attribute `{attribute}` cannot be modified")]
    InferredAttributeModified { attribute: String },
    /// A linked sequence loops back on itself.
    #[error("sequence attribute `{attribute}` contains a cycle")]
    SequenceCycle { attribute: String },
    /// A sequence could not be traversed as stored.
    #[error("sequence attribute `{attribute}` cannot be traversed: {reason}")]
    BrokenSequence { attribute: String, reason: String },
    /// An object attribute references an instance removed in the same
    /// transaction.
    #[error("attribute `{attribute}` references `{subject}`, which is removed in this transaction")]
    DanglingReference { attribute: String, subject: String },
    /// An abstract managed type was instantiated directly.
    #[error("cannot instantiate abstract managed type `{type_name}`")]
    AbstractInstantiation { type_name: String },
    /// A registered value converter failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// A malformed IRI reached the mapper.
    #[error(transparent)]
    InvalidIri(#[from] IriError),
}

/// Reconstructs instances from axiom bags and serializes modified instances
/// back into statements.
#[derive(Clone)]
pub struct ObjectGraphMapper {
    metamodel: Arc<Metamodel>,
    connector: Arc<ConnectorHandle>,
}

impl ObjectGraphMapper {
    /// Creates a mapper over the given metamodel and storage collaborator.
    #[must_use]
    pub fn new(metamodel: Arc<Metamodel>, connector: Arc<ConnectorHandle>) -> Self {
        Self {
            metamodel,
            connector,
        }
    }

    /// Returns the metamodel the mapper operates on.
    #[must_use]
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// Resolves the most specific managed type whose class IRI appears among
    /// the class assertions, within the declared type's hierarchy.
    ///
    /// Returns `None` when no asserted class maps to the hierarchy; several
    /// unrelated most specific matches are an error.
    pub fn resolve_entity_type(
        &self,
        declared_type: &str,
        subject: &NamedResource,
        axioms: &[Axiom],
    ) -> Result<Option<Arc<ManagedType>>, Error> {
        let declared = self.metamodel.entity(declared_type)?;
        let mut candidates: Vec<Arc<ManagedType>> = Vec::new();
        for axiom in axioms {
            if !axiom.assertion().is_class_assertion() {
                continue;
            }
            let Some(class) = axiom.value().as_resource() else {
                continue;
            };
            for candidate in self.metamodel.mapped_entities(class.identifier()) {
                if candidate.is_abstract() || !candidate.is_assignable_to(declared.name()) {
                    continue;
                }
                if !candidates.iter().any(|c| c.name() == candidate.name()) {
                    candidates.push(candidate);
                }
            }
        }

        let mut most_specific: Vec<Arc<ManagedType>> = candidates
            .iter()
            .filter(|candidate| {
                !candidates.iter().any(|other| {
                    other.name() != candidate.name() && other.is_assignable_to(candidate.name())
                })
            })
            .cloned()
            .collect();
        match most_specific.len() {
            0 => Ok(None),
            1 => Ok(most_specific.pop()),
            _ => Err(MappingError::AmbiguousEntityType {
                subject: subject.as_str().to_owned(),
            }
            .into()),
        }
    }

    /// Constructs an instance from the statements fetched for an identified
    /// resource.
    ///
    /// Lazily fetched attributes are left in the unloaded sentinel state;
    /// attribute-level failures abort the whole reconstruction.
    pub async fn reconstruct(
        &self,
        subject: &NamedResource,
        declared_type: &str,
        descriptor: &Descriptor,
        axioms: &[Axiom],
    ) -> Result<Option<Instance>, Error> {
        if axioms.is_empty() {
            return Ok(None);
        }
        let Some(entity_type) = self.resolve_entity_type(declared_type, subject, axioms)? else {
            return Ok(None);
        };

        let mut instance = Instance::new(entity_type.name());
        instance.assign_identifier(subject.clone());
        for attribute in entity_type.attributes().values() {
            if attribute.fetch() == FetchType::Lazy {
                instance.mark_unloaded(attribute.name());
                continue;
            }
            let state = self
                .build_attribute_value(&entity_type, attribute, subject, axioms, descriptor)
                .await?;
            instance.set_state(attribute.name(), state);
        }
        trace!(subject = %subject, entity_type = entity_type.name(), "reconstructed instance");
        Ok(Some(instance))
    }

    /// Loads a single attribute of an already materialized instance.
    pub async fn load_field(
        &self,
        entity_type: &ManagedType,
        subject: &NamedResource,
        attribute: &str,
        descriptor: &Descriptor,
    ) -> Result<FieldState, Error> {
        let Some(descriptor_attribute) = entity_type.attribute(attribute) else {
            return Err(MappingError::UnknownAttribute {
                type_name: entity_type.name().to_owned(),
                attribute: attribute.to_owned(),
            }
            .into());
        };
        let axioms = self.connector.find_axioms(subject, descriptor).await?;
        self.build_attribute_value(entity_type, descriptor_attribute, subject, &axioms, descriptor)
            .await
    }

    async fn build_attribute_value(
        &self,
        entity_type: &ManagedType,
        attribute: &AttributeDescriptor,
        subject: &NamedResource,
        axioms: &[Axiom],
        descriptor: &Descriptor,
    ) -> Result<FieldState, Error> {
        match attribute.kind() {
            AttributeKind::Sequence(layout) => {
                let group = self.attribute_group(attribute, axioms);
                match layout {
                    SequenceLayout::Linked { next } => {
                        self.load_linked(attribute, &group, next, descriptor).await
                    }
                    SequenceLayout::Indexed { index } => {
                        self.load_indexed(attribute, &group, index, descriptor).await
                    }
                }
            }
            AttributeKind::Query(query) => self.run_query(attribute, subject, query).await,
            AttributeKind::Types | AttributeKind::Properties => {
                self.accumulate(entity_type, attribute, axioms.iter())
            }
            _ => {
                let group = self.attribute_group(attribute, axioms);
                self.accumulate(entity_type, attribute, group)
            }
        }
    }

    /// Selects the statements bound to an attribute's predicate, honouring
    /// the inference flag: a non-inferred attribute ignores reasoner-derived
    /// statements.
    fn attribute_group<'x>(
        &self,
        attribute: &AttributeDescriptor,
        axioms: &'x [Axiom],
    ) -> Vec<&'x Axiom> {
        axioms
            .iter()
            .filter(|axiom| {
                Some(axiom.assertion().predicate()) == attribute.predicate()
                    && (attribute.is_inferred() || !axiom.assertion().is_inferred())
            })
            .collect()
    }

    fn accumulate<'x>(
        &self,
        entity_type: &ManagedType,
        attribute: &AttributeDescriptor,
        axioms: impl IntoIterator<Item = &'x Axiom>,
    ) -> Result<FieldState, Error> {
        let Some(mut strategy) = strategies::strategy_for(entity_type, attribute) else {
            return Ok(FieldState::Empty);
        };
        for axiom in axioms {
            if !attribute.is_inferred() && axiom.assertion().is_inferred() {
                continue;
            }
            strategy.add_value_from_axiom(axiom)?;
        }
        Ok(strategy.build_field_value()?)
    }

    async fn load_linked(
        &self,
        attribute: &AttributeDescriptor,
        group: &[&Axiom],
        next: &Iri,
        descriptor: &Descriptor,
    ) -> Result<FieldState, Error> {
        let heads: Vec<NamedResource> = group
            .iter()
            .filter_map(|axiom| axiom.value().as_resource().cloned())
            .collect();
        let Some(head) = heads.first() else {
            return Ok(FieldState::Empty);
        };
        if heads.len() > 1 {
            return Err(MappingError::CardinalityViolation {
                attribute: attribute.name().to_owned(),
            }
            .into());
        }

        let mut values = Vec::new();
        let mut visited: BTreeSet<NamedResource> = BTreeSet::new();
        let mut current = head.clone();
        loop {
            if !visited.insert(current.clone()) {
                return Err(MappingError::SequenceCycle {
                    attribute: attribute.name().to_owned(),
                }
                .into());
            }
            values.push(Value::Resource(current.clone()));
            let statements = self.connector.find_axioms(&current, descriptor).await?;
            let successors: Vec<NamedResource> = statements
                .iter()
                .filter(|axiom| {
                    axiom.assertion().predicate() == next
                        && (attribute.is_inferred() || !axiom.assertion().is_inferred())
                })
                .filter_map(|axiom| axiom.value().as_resource().cloned())
                .collect();
            match successors.as_slice() {
                [] => break,
                [successor] => current = successor.clone(),
                _ => {
                    return Err(MappingError::BrokenSequence {
                        attribute: attribute.name().to_owned(),
                        reason: format!("node {current} has several successors"),
                    }
                    .into())
                }
            }
        }
        Ok(FieldState::Present(FieldValue::List(values)))
    }

    async fn load_indexed(
        &self,
        attribute: &AttributeDescriptor,
        group: &[&Axiom],
        index: &Iri,
        descriptor: &Descriptor,
    ) -> Result<FieldState, Error> {
        let elements: Vec<NamedResource> = group
            .iter()
            .filter_map(|axiom| axiom.value().as_resource().cloned())
            .collect();
        if elements.is_empty() {
            return Ok(FieldState::Empty);
        }

        let mut positioned: Vec<(i64, NamedResource)> = Vec::with_capacity(elements.len());
        let mut seen_positions: BTreeSet<i64> = BTreeSet::new();
        for element in elements {
            let statements = self.connector.find_axioms(&element, descriptor).await?;
            let position = statements
                .iter()
                .filter(|axiom| axiom.assertion().predicate() == index)
                .find_map(|axiom| axiom.value().as_literal().and_then(|l| l.as_integer()));
            let Some(position) = position else {
                return Err(MappingError::BrokenSequence {
                    attribute: attribute.name().to_owned(),
                    reason: format!("element {element} has no position"),
                }
                .into());
            };
            if !seen_positions.insert(position) {
                return Err(MappingError::BrokenSequence {
                    attribute: attribute.name().to_owned(),
                    reason: format!("duplicate position {position}"),
                }
                .into());
            }
            positioned.push((position, element));
        }
        positioned.sort_by_key(|(position, _)| *position);
        Ok(FieldState::Present(FieldValue::List(
            positioned
                .into_iter()
                .map(|(_, element)| Value::Resource(element))
                .collect(),
        )))
    }

    /// Executes the fixed native query of a query-derived attribute with the
    /// instance identifier bound to [`QUERY_SUBJECT_BINDING`]. The first
    /// column of each row becomes a value.
    async fn run_query(
        &self,
        attribute: &AttributeDescriptor,
        subject: &NamedResource,
        query: &str,
    ) -> Result<FieldState, Error> {
        let mut bindings = QueryBindings::new();
        bindings.bind(QUERY_SUBJECT_BINDING, Value::Resource(subject.clone()));
        let rows = self
            .connector
            .execute_native_query(query, &bindings)
            .await?;
        let values: Vec<Value> = rows
            .into_iter()
            .filter_map(|row| row.column(0).cloned())
            .collect();
        match attribute.cardinality() {
            Cardinality::Singular => match values.as_slice() {
                [] => Ok(FieldState::Empty),
                [value] => Ok(FieldState::Present(FieldValue::Scalar(value.clone()))),
                _ => Err(MappingError::CardinalityViolation {
                    attribute: attribute.name().to_owned(),
                }
                .into()),
            },
            _ => Ok(if values.is_empty() {
                FieldState::Empty
            } else {
                FieldState::Present(FieldValue::Set(values.into_iter().collect()))
            }),
        }
    }
}
