use std::collections::{BTreeMap, BTreeSet};

use oxrdf::vocab::xsd;

use crate::metamodel::attributes::{
    AttributeDescriptor, AttributeKind, Cardinality, ValueConverter,
};
use crate::metamodel::types::ManagedType;
use crate::model::axiom::{Assertion, Axiom};
use crate::model::instance::{FieldState, FieldValue};
use crate::model::value_objects::{Iri, Literal, NamedResource, Value};

use super::sequences;
use super::MappingError;

/// Read-side accumulation of one attribute's statements into a field value.
///
/// One strategy variant exists per attribute kind and cardinality pair;
/// sequence and query-derived attributes are orchestrated directly by the
/// mapper because their reconstruction needs the storage collaborator.
pub(crate) trait AttributeStrategy {
    /// Accumulates one incoming statement into the internal buffer.
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError>;

    /// Finalizes the buffer into the concrete field representation, applying
    /// the inverse converter.
    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError>;
}

/// Returns the strategy for an attribute, or `None` for the kinds the mapper
/// handles itself (sequences and query-derived attributes).
pub(crate) fn strategy_for<'a>(
    entity_type: &'a ManagedType,
    attribute: &'a AttributeDescriptor,
) -> Option<Box<dyn AttributeStrategy + 'a>> {
    match (attribute.kind(), attribute.cardinality()) {
        (AttributeKind::Data | AttributeKind::Annotation, Cardinality::Singular) => {
            Some(Box::new(SingularValueStrategy::new(attribute)))
        }
        (AttributeKind::Data | AttributeKind::Annotation, _) => {
            Some(Box::new(PluralValueStrategy::new(attribute)))
        }
        (AttributeKind::Object, Cardinality::Singular) => {
            Some(Box::new(SingularObjectStrategy::new(attribute)))
        }
        (AttributeKind::Object, _) => Some(Box::new(PluralObjectStrategy::new(attribute))),
        (AttributeKind::Types, _) => Some(Box::new(TypesStrategy::new(entity_type))),
        (AttributeKind::Properties, _) => Some(Box::new(PropertiesStrategy::new(entity_type))),
        (AttributeKind::Sequence(_) | AttributeKind::Query(_), _) => None,
    }
}

fn convert_inbound(
    attribute: &AttributeDescriptor,
    value: &Value,
) -> Result<Value, MappingError> {
    match attribute.converter() {
        Some(converter) => Ok(converter.to_field_value(value)?),
        None => Ok(value.clone()),
    }
}

struct SingularValueStrategy<'a> {
    attribute: &'a AttributeDescriptor,
    value: Option<Value>,
}

impl<'a> SingularValueStrategy<'a> {
    fn new(attribute: &'a AttributeDescriptor) -> Self {
        Self {
            attribute,
            value: None,
        }
    }
}

impl AttributeStrategy for SingularValueStrategy<'_> {
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError> {
        let incoming = axiom.value();
        // Data attributes bind literals only; values outside the range are
        // skipped the same way unresolvable statements are.
        if incoming.is_null()
            || (matches!(self.attribute.kind(), AttributeKind::Data)
                && incoming.as_literal().is_none())
        {
            return Ok(());
        }
        let converted = convert_inbound(self.attribute, incoming)?;
        match &self.value {
            None => {
                self.value = Some(converted);
                Ok(())
            }
            Some(existing) if *existing == converted => Ok(()),
            Some(_) => Err(MappingError::CardinalityViolation {
                attribute: self.attribute.name().to_owned(),
            }),
        }
    }

    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError> {
        Ok(match self.value {
            Some(value) => FieldState::Present(FieldValue::Scalar(value)),
            None => FieldState::Empty,
        })
    }
}

struct PluralValueStrategy<'a> {
    attribute: &'a AttributeDescriptor,
    values: BTreeSet<Value>,
}

impl<'a> PluralValueStrategy<'a> {
    fn new(attribute: &'a AttributeDescriptor) -> Self {
        Self {
            attribute,
            values: BTreeSet::new(),
        }
    }
}

impl AttributeStrategy for PluralValueStrategy<'_> {
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError> {
        let incoming = axiom.value();
        if incoming.is_null()
            || (matches!(self.attribute.kind(), AttributeKind::Data)
                && incoming.as_literal().is_none())
        {
            return Ok(());
        }
        self.values.insert(convert_inbound(self.attribute, incoming)?);
        Ok(())
    }

    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError> {
        Ok(if self.values.is_empty() {
            FieldState::Empty
        } else {
            FieldState::Present(FieldValue::Set(self.values))
        })
    }
}

struct SingularObjectStrategy<'a> {
    attribute: &'a AttributeDescriptor,
    value: Option<NamedResource>,
}

impl<'a> SingularObjectStrategy<'a> {
    fn new(attribute: &'a AttributeDescriptor) -> Self {
        Self {
            attribute,
            value: None,
        }
    }
}

impl AttributeStrategy for SingularObjectStrategy<'_> {
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError> {
        let Some(resource) = axiom.value().as_resource() else {
            return Ok(());
        };
        match &self.value {
            None => {
                self.value = Some(resource.clone());
                Ok(())
            }
            Some(existing) if existing == resource => Ok(()),
            Some(_) => Err(MappingError::CardinalityViolation {
                attribute: self.attribute.name().to_owned(),
            }),
        }
    }

    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError> {
        Ok(match self.value {
            Some(resource) => FieldState::Present(FieldValue::Scalar(Value::Resource(resource))),
            None => FieldState::Empty,
        })
    }
}

struct PluralObjectStrategy<'a> {
    #[allow(dead_code)]
    attribute: &'a AttributeDescriptor,
    values: BTreeSet<Value>,
}

impl<'a> PluralObjectStrategy<'a> {
    fn new(attribute: &'a AttributeDescriptor) -> Self {
        Self {
            attribute,
            values: BTreeSet::new(),
        }
    }
}

impl AttributeStrategy for PluralObjectStrategy<'_> {
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError> {
        if let Some(resource) = axiom.value().as_resource() {
            self.values.insert(Value::Resource(resource.clone()));
        }
        Ok(())
    }

    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError> {
        Ok(if self.values.is_empty() {
            FieldState::Empty
        } else {
            FieldState::Present(FieldValue::Set(self.values))
        })
    }
}

/// Collects the asserted resource classes, excluding the primary declaring
/// class of the resolved type.
struct TypesStrategy<'a> {
    primary: &'a Iri,
    values: BTreeSet<Value>,
}

impl<'a> TypesStrategy<'a> {
    fn new(entity_type: &'a ManagedType) -> Self {
        Self {
            primary: entity_type.class_iri(),
            values: BTreeSet::new(),
        }
    }
}

impl AttributeStrategy for TypesStrategy<'_> {
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError> {
        if !axiom.assertion().is_class_assertion() {
            return Ok(());
        }
        if let Some(resource) = axiom.value().as_resource() {
            if resource.identifier() != self.primary {
                self.values.insert(Value::Resource(resource.clone()));
            }
        }
        Ok(())
    }

    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError> {
        Ok(if self.values.is_empty() {
            FieldState::Empty
        } else {
            FieldState::Present(FieldValue::Set(self.values))
        })
    }
}

/// Preserves statements whose predicate is not otherwise declared on the
/// type, keyed by predicate.
struct PropertiesStrategy<'a> {
    entity_type: &'a ManagedType,
    entries: BTreeMap<Iri, BTreeSet<Value>>,
}

impl<'a> PropertiesStrategy<'a> {
    fn new(entity_type: &'a ManagedType) -> Self {
        Self {
            entity_type,
            entries: BTreeMap::new(),
        }
    }
}

impl AttributeStrategy for PropertiesStrategy<'_> {
    fn add_value_from_axiom(&mut self, axiom: &Axiom) -> Result<(), MappingError> {
        let assertion = axiom.assertion();
        if assertion.is_class_assertion()
            || self
                .entity_type
                .declared_predicates()
                .contains(assertion.predicate())
            || axiom.value().is_null()
        {
            return Ok(());
        }
        self.entries
            .entry(assertion.predicate().clone())
            .or_default()
            .insert(axiom.value().clone());
        Ok(())
    }

    fn build_field_value(self: Box<Self>) -> Result<FieldState, MappingError> {
        Ok(if self.entries.is_empty() {
            FieldState::Empty
        } else {
            FieldState::Present(FieldValue::Map(self.entries))
        })
    }
}

/// Builds the assertion used when writing an attribute's statements.
pub(crate) fn attribute_assertion(
    attribute: &AttributeDescriptor,
) -> Result<Assertion, MappingError> {
    let Some(predicate) = attribute.predicate() else {
        return Err(MappingError::UnsupportedElementShape {
            attribute: attribute.name().to_owned(),
        });
    };
    let assertion = match attribute.kind() {
        AttributeKind::Data => Assertion::data(predicate.clone(), attribute.is_inferred()),
        AttributeKind::Annotation => {
            Assertion::annotation(predicate.clone(), attribute.is_inferred())
        }
        AttributeKind::Object | AttributeKind::Sequence(_) => {
            Assertion::object(predicate.clone(), attribute.is_inferred())
        }
        AttributeKind::Types | AttributeKind::Properties | AttributeKind::Query(_) => {
            return Err(MappingError::UnsupportedElementShape {
                attribute: attribute.name().to_owned(),
            })
        }
    };
    Ok(assertion)
}

fn convert_outbound(
    attribute: &AttributeDescriptor,
    value: &Value,
) -> Result<Value, MappingError> {
    let converted = match attribute.converter() {
        Some(converter) => converter.to_axiom_value(value)?,
        None => value.clone(),
    };
    Ok(apply_language(attribute, converted))
}

/// Tags plain string literals with the attribute language, when configured.
fn apply_language(attribute: &AttributeDescriptor, value: Value) -> Value {
    let Some(language) = attribute.language() else {
        return value;
    };
    if !matches!(
        attribute.kind(),
        AttributeKind::Data | AttributeKind::Annotation
    ) {
        return value;
    }
    match value {
        Value::Literal(literal)
            if literal.language().is_none() && literal.datatype().as_str() == xsd::STRING.as_str() =>
        {
            Value::Literal(Literal::lang_string(literal.lexical_form(), language))
        }
        other => other,
    }
}

fn state_values<'v>(
    attribute: &AttributeDescriptor,
    state: &'v FieldState,
) -> Result<Vec<&'v Value>, MappingError> {
    let values: Vec<&Value> = match (state, attribute.cardinality()) {
        (FieldState::Unloaded | FieldState::Empty, _) => Vec::new(),
        (FieldState::Present(FieldValue::Scalar(value)), Cardinality::Singular) => {
            if value.is_null() {
                Vec::new()
            } else {
                vec![value]
            }
        }
        (FieldState::Present(FieldValue::Set(values)), Cardinality::Set) => {
            values.iter().collect()
        }
        (FieldState::Present(FieldValue::List(values)), Cardinality::List) => {
            values.iter().collect()
        }
        (FieldState::Present(_), _) => {
            return Err(MappingError::CardinalityViolation {
                attribute: attribute.name().to_owned(),
            })
        }
    };
    Ok(values)
}

/// Reads an attribute's field value and produces its graph statements.
///
/// An empty value on a required attribute fails; an optional empty value
/// emits the single absence sentinel when `emit_absence_sentinel` is set,
/// unless the attribute is inferred. Inferred and query-derived attributes
/// never produce statements.
pub(crate) fn extract_attribute_axioms(
    entity_type: &ManagedType,
    attribute: &AttributeDescriptor,
    subject: &NamedResource,
    state: &FieldState,
    emit_absence_sentinel: bool,
) -> Result<Vec<Axiom>, MappingError> {
    if matches!(attribute.kind(), AttributeKind::Query(_)) || attribute.is_inferred() {
        return Ok(Vec::new());
    }
    if matches!(state, FieldState::Unloaded) {
        return Ok(Vec::new());
    }

    match attribute.kind() {
        AttributeKind::Types => extract_types(entity_type, attribute, subject, state),
        AttributeKind::Properties => extract_properties(attribute, subject, state),
        AttributeKind::Sequence(layout) => {
            let values = state_values(attribute, state)?;
            if values.is_empty() {
                return extract_empty(attribute, subject, emit_absence_sentinel);
            }
            sequences::sequence_axioms(attribute, layout, subject, &values)
        }
        _ => {
            let values = state_values(attribute, state)?;
            if values.is_empty() {
                return extract_empty(attribute, subject, emit_absence_sentinel);
            }
            if let Some(constraint) = attribute.constraint() {
                if let Some(max) = constraint.max() {
                    if values.len() as u32 > max {
                        return Err(MappingError::CardinalityViolation {
                            attribute: attribute.name().to_owned(),
                        });
                    }
                }
            }
            let assertion = attribute_assertion(attribute)?;
            let mut axioms = Vec::with_capacity(values.len());
            for value in values {
                let converted = convert_outbound(attribute, value)?;
                validate_range(attribute, &converted)?;
                axioms.push(Axiom::new(subject.clone(), assertion.clone(), converted));
            }
            Ok(axioms)
        }
    }
}

fn extract_empty(
    attribute: &AttributeDescriptor,
    subject: &NamedResource,
    emit_absence_sentinel: bool,
) -> Result<Vec<Axiom>, MappingError> {
    if attribute.is_required() {
        return Err(MappingError::MissingRequiredValue {
            attribute: attribute.name().to_owned(),
        });
    }
    if emit_absence_sentinel {
        let assertion = attribute_assertion(attribute)?;
        return Ok(vec![Axiom::new(subject.clone(), assertion, Value::Null)]);
    }
    Ok(Vec::new())
}

fn validate_range(attribute: &AttributeDescriptor, value: &Value) -> Result<(), MappingError> {
    let valid = match attribute.kind() {
        AttributeKind::Data => value.as_literal().is_some(),
        AttributeKind::Object | AttributeKind::Sequence(_) => value.as_resource().is_some(),
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(MappingError::UnsupportedElementShape {
            attribute: attribute.name().to_owned(),
        })
    }
}

fn extract_types(
    entity_type: &ManagedType,
    attribute: &AttributeDescriptor,
    subject: &NamedResource,
    state: &FieldState,
) -> Result<Vec<Axiom>, MappingError> {
    let values = state_values(attribute, state)?;
    let mut axioms = Vec::with_capacity(values.len());
    for value in values {
        let Some(resource) = value.as_resource() else {
            return Err(MappingError::UnsupportedElementShape {
                attribute: attribute.name().to_owned(),
            });
        };
        if resource.identifier() == entity_type.class_iri() {
            continue;
        }
        axioms.push(Axiom::new(
            subject.clone(),
            Assertion::class(attribute.is_inferred()),
            value.clone(),
        ));
    }
    Ok(axioms)
}

fn extract_properties(
    attribute: &AttributeDescriptor,
    subject: &NamedResource,
    state: &FieldState,
) -> Result<Vec<Axiom>, MappingError> {
    let entries = match state {
        FieldState::Unloaded | FieldState::Empty => return Ok(Vec::new()),
        FieldState::Present(FieldValue::Map(entries)) => entries,
        FieldState::Present(_) => {
            return Err(MappingError::UnsupportedElementShape {
                attribute: attribute.name().to_owned(),
            })
        }
    };
    let mut axioms = Vec::new();
    for (predicate, values) in entries {
        for value in values {
            if value.is_null() {
                continue;
            }
            let assertion = match value {
                Value::Resource(_) => Assertion::object(predicate.clone(), false),
                _ => Assertion::data(predicate.clone(), false),
            };
            axioms.push(Axiom::new(subject.clone(), assertion, value.clone()));
        }
    }
    Ok(axioms)
}
