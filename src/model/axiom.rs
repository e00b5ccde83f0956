use std::fmt::{self, Display, Formatter};

use oxrdf::vocab::rdf;

use super::value_objects::{Iri, NamedResource, Value};

/// Returns the `rdf:type` predicate used by class assertions.
#[must_use]
pub fn rdf_type() -> Iri {
    Iri::new_unchecked(rdf::TYPE.as_str())
}

/// Classifies the predicate component of a statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssertionKind {
    /// Class membership assertion (`rdf:type`).
    Class,
    /// Data property assertion with a literal value.
    Data,
    /// Object property assertion linking two resources.
    Object,
    /// Annotation property assertion accepting literals or resources.
    Annotation,
}

/// The predicate component of a statement, together with its kind and whether
/// the statement may originate from a reasoner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Assertion {
    predicate: Iri,
    kind: AssertionKind,
    inferred: bool,
}

impl Assertion {
    /// Creates a class membership assertion.
    #[must_use]
    pub fn class(inferred: bool) -> Self {
        Self {
            predicate: rdf_type(),
            kind: AssertionKind::Class,
            inferred,
        }
    }

    /// Creates a data property assertion.
    #[must_use]
    pub fn data(predicate: Iri, inferred: bool) -> Self {
        Self {
            predicate,
            kind: AssertionKind::Data,
            inferred,
        }
    }

    /// Creates an object property assertion.
    #[must_use]
    pub fn object(predicate: Iri, inferred: bool) -> Self {
        Self {
            predicate,
            kind: AssertionKind::Object,
            inferred,
        }
    }

    /// Creates an annotation property assertion.
    #[must_use]
    pub fn annotation(predicate: Iri, inferred: bool) -> Self {
        Self {
            predicate,
            kind: AssertionKind::Annotation,
            inferred,
        }
    }

    /// Returns the predicate identifier.
    #[must_use]
    pub fn predicate(&self) -> &Iri {
        &self.predicate
    }

    /// Returns the assertion kind.
    #[must_use]
    pub fn kind(&self) -> AssertionKind {
        self.kind
    }

    /// Returns whether the statement may be reasoner-derived.
    #[must_use]
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// Returns `true` for class membership assertions.
    #[must_use]
    pub fn is_class_assertion(&self) -> bool {
        self.kind == AssertionKind::Class
    }
}

/// One subject–predicate–value graph statement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Axiom {
    subject: NamedResource,
    assertion: Assertion,
    value: Value,
}

impl Axiom {
    /// Creates a new statement.
    #[must_use]
    pub fn new(subject: NamedResource, assertion: Assertion, value: Value) -> Self {
        Self {
            subject,
            assertion,
            value,
        }
    }

    /// Returns the statement subject.
    #[must_use]
    pub fn subject(&self) -> &NamedResource {
        &self.subject
    }

    /// Returns the predicate component.
    #[must_use]
    pub fn assertion(&self) -> &Assertion {
        &self.assertion
    }

    /// Returns the statement value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Display for Axiom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {}",
            self.subject,
            self.assertion.predicate(),
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{rdf_type, Assertion, AssertionKind, Axiom};
    use crate::model::value_objects::{Iri, NamedResource, Value};

    fn iri(text: &str) -> Iri {
        Iri::new(text).expect("valid iri")
    }

    #[test]
    fn class_assertion_uses_rdf_type() {
        let assertion = Assertion::class(false);
        assert_eq!(assertion.predicate(), &rdf_type());
        assert!(assertion.is_class_assertion());
        assert!(!assertion.is_inferred());
    }

    #[test]
    fn assertions_carry_kind_and_inference_flag() {
        let data = Assertion::data(iri("https://example.org/name"), true);
        assert_eq!(data.kind(), AssertionKind::Data);
        assert!(data.is_inferred());
        assert!(!data.is_class_assertion());
    }

    #[test]
    fn axiom_display_renders_triple() {
        let subject = NamedResource::parse("https://example.org/alice").expect("subject");
        let axiom = Axiom::new(
            subject,
            Assertion::object(iri("https://example.org/knows"), false),
            Value::Resource(NamedResource::parse("https://example.org/bob").expect("object")),
        );
        assert_eq!(
            axiom.to_string(),
            "<https://example.org/alice> <https://example.org/knows> <https://example.org/bob>"
        );
    }
}
