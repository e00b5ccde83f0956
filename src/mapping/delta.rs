use std::collections::BTreeSet;

use crate::metamodel::attributes::AttributeKind;
use crate::metamodel::types::ManagedType;
use crate::model::axiom::{Assertion, Axiom};
use crate::model::instance::{FieldState, Instance};
use crate::model::value_objects::{NamedResource, Value};

use super::strategies::extract_attribute_axioms;
use super::MappingError;

/// Statement-level changes of one attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDelta {
    /// Attribute the changes belong to.
    pub attribute: String,
    /// Statements to assert.
    pub additions: Vec<Axiom>,
    /// Statements to retract.
    pub removals: Vec<Axiom>,
    /// When set, the attribute had no loaded original state; the connector
    /// replaces the attribute's assertions with `additions` instead of
    /// applying point removals.
    pub replace: bool,
}

impl FieldDelta {
    /// Returns `true` when the delta carries no work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Per-attribute change script for one modified instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet {
    /// Subject resource the changes apply to.
    pub subject: NamedResource,
    /// Managed type of the instance.
    pub type_name: String,
    /// Non-empty attribute deltas.
    pub deltas: Vec<FieldDelta>,
}

impl ChangeSet {
    /// Returns `true` when no attribute changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Compares an original snapshot against its working copy and emits an
/// add/remove pair per changed attribute.
///
/// The comparison is per attribute, never per object: unchanged attributes
/// produce no statements at all, and list edits surface as the link
/// statements the edit actually touches.
pub fn compute_delta(
    entity_type: &ManagedType,
    original: &Instance,
    working: &Instance,
) -> Result<ChangeSet, MappingError> {
    let subject = working
        .identifier()
        .ok_or_else(|| MappingError::MissingIdentifier {
            type_name: entity_type.name().to_owned(),
        })?
        .clone();

    let mut deltas = Vec::new();
    for attribute in entity_type.attributes().values() {
        // Untouched working fields carry no information and never clear
        // stored values; this is what makes merging partially populated
        // detached instances safe.
        if !working.has_field(attribute.name()) {
            continue;
        }
        let old_state = original.field(attribute.name());
        let new_state = working.field(attribute.name());
        if matches!(new_state, FieldState::Unloaded) || old_state == new_state {
            continue;
        }
        if matches!(attribute.kind(), AttributeKind::Query(_)) {
            continue;
        }
        if attribute.is_inferred() {
            return Err(MappingError::InferredAttributeModified {
                attribute: attribute.name().to_owned(),
            });
        }

        let delta = if matches!(old_state, FieldState::Unloaded) {
            // No loaded original to diff against: replace the attribute
            // wholesale, with the absence sentinel signalling a cleared value.
            FieldDelta {
                attribute: attribute.name().to_owned(),
                additions: extract_attribute_axioms(
                    entity_type,
                    attribute,
                    &subject,
                    new_state,
                    true,
                )?,
                removals: Vec::new(),
                replace: true,
            }
        } else {
            let old_axioms =
                extract_attribute_axioms(entity_type, attribute, &subject, old_state, false)?;
            let new_axioms =
                extract_attribute_axioms(entity_type, attribute, &subject, new_state, false)?;
            let old_set: BTreeSet<&Axiom> = old_axioms.iter().collect();
            let new_set: BTreeSet<&Axiom> = new_axioms.iter().collect();
            FieldDelta {
                attribute: attribute.name().to_owned(),
                additions: new_axioms
                    .iter()
                    .filter(|axiom| !old_set.contains(axiom))
                    .cloned()
                    .collect(),
                removals: old_axioms
                    .iter()
                    .filter(|axiom| !new_set.contains(axiom))
                    .cloned()
                    .collect(),
                replace: false,
            }
        };
        if !delta.is_empty() {
            deltas.push(delta);
        }
    }

    Ok(ChangeSet {
        subject,
        type_name: entity_type.name().to_owned(),
        deltas,
    })
}

/// Serializes a whole instance into the statements persisting it, including
/// its primary class assertion.
pub fn extract_entity_axioms(
    entity_type: &ManagedType,
    instance: &Instance,
) -> Result<Vec<Axiom>, MappingError> {
    let subject = instance
        .identifier()
        .ok_or_else(|| MappingError::MissingIdentifier {
            type_name: entity_type.name().to_owned(),
        })?;

    let mut axioms = vec![Axiom::new(
        subject.clone(),
        Assertion::class(false),
        Value::Resource(NamedResource::new(entity_type.class_iri().clone())),
    )];
    for attribute in entity_type.attributes().values() {
        axioms.extend(extract_attribute_axioms(
            entity_type,
            attribute,
            subject,
            instance.field(attribute.name()),
            true,
        )?);
    }
    Ok(axioms)
}

#[cfg(test)]
mod tests {
    use super::{compute_delta, extract_entity_axioms};
    use crate::metamodel::attributes::{
        AttributeDescriptor, IdentifierDescriptor, SequenceLayout,
    };
    use crate::metamodel::builder::MetamodelBuilder;
    use crate::metamodel::types::{ManagedType, TypeMapping};
    use crate::model::instance::{FieldValue, Instance};
    use crate::model::value_objects::{Iri, Literal, NamedResource, Value};
    use crate::MappingError;

    fn iri(text: &str) -> Iri {
        Iri::new(text).expect("valid iri")
    }

    fn resource(text: &str) -> NamedResource {
        NamedResource::parse(text).expect("resource")
    }

    fn person_type() -> std::sync::Arc<ManagedType> {
        let mapping = TypeMapping::new("Person", iri("https://example.org/Person"))
            .with_identifier(IdentifierDescriptor::new("uri"))
            .with_attribute(AttributeDescriptor::data(
                "firstName",
                iri("https://example.org/firstName"),
            ))
            .with_attribute(
                AttributeDescriptor::data("nickname", iri("https://example.org/nickname")).plural(),
            )
            .with_attribute(
                AttributeDescriptor::data("memberships", iri("https://example.org/memberOf"))
                    .plural()
                    .inferred(),
            )
            .with_attribute(AttributeDescriptor::sequence(
                "friendsOrdered",
                iri("https://example.org/hasFirst"),
                SequenceLayout::Linked {
                    next: iri("https://example.org/hasNext"),
                },
                "Person",
            ));
        MetamodelBuilder::new()
            .register(mapping)
            .build()
            .expect("metamodel")
            .entity("Person")
            .expect("person")
    }

    fn person(first_name: &str) -> Instance {
        Instance::new("Person")
            .with_identifier(resource("https://example.org/P1"))
            .with_field(
                "firstName",
                FieldValue::scalar(Value::Literal(Literal::string(first_name))),
            )
    }

    #[test]
    fn unchanged_instance_produces_empty_delta() {
        let entity_type = person_type();
        let original = person("Alice");
        let change_set = compute_delta(&entity_type, &original, &original.clone())
            .expect("delta");
        assert!(change_set.is_empty());
    }

    #[test]
    fn changed_scalar_emits_add_remove_pair() {
        let entity_type = person_type();
        let original = person("Alice");
        let mut working = original.clone();
        working.set(
            "firstName",
            FieldValue::scalar(Value::Literal(Literal::string("Alicia"))),
        );

        let change_set = compute_delta(&entity_type, &original, &working).expect("delta");
        assert_eq!(change_set.deltas.len(), 1);
        let delta = &change_set.deltas[0];
        assert_eq!(delta.attribute, "firstName");
        assert_eq!(delta.additions.len(), 1);
        assert_eq!(delta.removals.len(), 1);
        assert!(!delta.replace);
    }

    #[test]
    fn list_reorder_touches_only_changed_links() {
        let entity_type = person_type();
        let a = Value::Resource(resource("https://example.org/A"));
        let b = Value::Resource(resource("https://example.org/B"));
        let c = Value::Resource(resource("https://example.org/C"));

        let original = person("Alice").with_field(
            "friendsOrdered",
            FieldValue::list([a.clone(), b.clone(), c.clone()]),
        );
        let mut working = original.clone();
        working.set("friendsOrdered", FieldValue::list([c, a.clone(), b]));

        let change_set = compute_delta(&entity_type, &original, &working).expect("delta");
        assert_eq!(change_set.deltas.len(), 1);
        let delta = &change_set.deltas[0];
        // The a -> b link survives the reorder untouched, so no statement in
        // the delta has A as its subject.
        assert_eq!(delta.additions.len(), 2);
        assert_eq!(delta.removals.len(), 2);
        for axiom in delta.additions.iter().chain(&delta.removals) {
            assert_ne!(axiom.subject().as_str(), "https://example.org/A");
        }
    }

    #[test]
    fn modifying_inferred_attribute_is_rejected() {
        let entity_type = person_type();
        let original = person("Alice");
        let mut working = original.clone();
        working.set(
            "memberships",
            FieldValue::set([Value::Resource(resource("https://example.org/Club"))]),
        );
        let err = compute_delta(&entity_type, &original, &working).expect_err("inferred");
        assert!(matches!(
            err,
            MappingError::InferredAttributeModified { attribute } if attribute == "memberships"
        ));
    }

    #[test]
    fn unloaded_original_yields_replace_delta() {
        let entity_type = person_type();
        let mut original = Instance::new("Person");
        original.assign_identifier(resource("https://example.org/P1"));
        original.mark_unloaded("firstName");
        let mut working = original.clone();
        working.set(
            "firstName",
            FieldValue::scalar(Value::Literal(Literal::string("Alice"))),
        );

        let change_set = compute_delta(&entity_type, &original, &working).expect("delta");
        assert_eq!(change_set.deltas.len(), 1);
        assert!(change_set.deltas[0].replace);
        assert!(change_set.deltas[0].removals.is_empty());
    }

    #[test]
    fn entity_extraction_includes_class_assertion() {
        let entity_type = person_type();
        let instance = person("Alice");
        let axioms = extract_entity_axioms(&entity_type, &instance).expect("axioms");
        assert!(axioms
            .iter()
            .any(|axiom| axiom.assertion().is_class_assertion()
                && axiom.value()
                    == &Value::Resource(resource("https://example.org/Person"))));
    }

    #[test]
    fn missing_identifier_fails_extraction() {
        let entity_type = person_type();
        let instance = Instance::new("Person");
        let err = extract_entity_axioms(&entity_type, &instance).expect_err("no identifier");
        assert!(matches!(err, MappingError::MissingIdentifier { .. }));
    }
}
