use crate::metamodel::attributes::{AttributeDescriptor, SequenceLayout};
use crate::model::axiom::{Assertion, Axiom};
use crate::model::value_objects::{Literal, NamedResource, Value};

use super::MappingError;

/// Produces the statements modelling an ordered sequence.
///
/// A linked sequence is written as a head pointer through the attribute
/// predicate plus one next-element link per node; an indexed sequence is one
/// statement per element through the attribute predicate plus an integer
/// position asserted on each element. Writing deltas as set differences over
/// these statements touches only the links an edit actually changes.
pub(crate) fn sequence_axioms(
    attribute: &AttributeDescriptor,
    layout: &SequenceLayout,
    subject: &NamedResource,
    values: &[&Value],
) -> Result<Vec<Axiom>, MappingError> {
    let elements = resources_of(attribute, values)?;
    let head_assertion = Assertion::object(
        attribute
            .predicate()
            .ok_or_else(|| MappingError::UnsupportedElementShape {
                attribute: attribute.name().to_owned(),
            })?
            .clone(),
        attribute.is_inferred(),
    );

    let mut axioms = Vec::new();
    match layout {
        SequenceLayout::Linked { next } => {
            let Some(head) = elements.first() else {
                return Ok(axioms);
            };
            axioms.push(Axiom::new(
                subject.clone(),
                head_assertion,
                Value::Resource((*head).clone()),
            ));
            let next_assertion = Assertion::object(next.clone(), attribute.is_inferred());
            for pair in elements.windows(2) {
                axioms.push(Axiom::new(
                    pair[0].clone(),
                    next_assertion.clone(),
                    Value::Resource(pair[1].clone()),
                ));
            }
        }
        SequenceLayout::Indexed { index } => {
            let index_assertion = Assertion::data(index.clone(), attribute.is_inferred());
            for (position, element) in elements.iter().enumerate() {
                axioms.push(Axiom::new(
                    subject.clone(),
                    head_assertion.clone(),
                    Value::Resource((*element).clone()),
                ));
                axioms.push(Axiom::new(
                    (*element).clone(),
                    index_assertion.clone(),
                    Value::Literal(Literal::integer(position as i64)),
                ));
            }
        }
    }
    Ok(axioms)
}

fn resources_of<'v>(
    attribute: &AttributeDescriptor,
    values: &[&'v Value],
) -> Result<Vec<&'v NamedResource>, MappingError> {
    values
        .iter()
        .map(|value| {
            value
                .as_resource()
                .ok_or_else(|| MappingError::UnsupportedElementShape {
                    attribute: attribute.name().to_owned(),
                })
        })
        .collect()
}
