use std::collections::BTreeMap;

use super::value_objects::Iri;

/// Qualifies which named-graph context statements are read from or written to.
///
/// A descriptor carries an optional context for the whole resource plus
/// per-attribute overrides. An absent context means the backend's default
/// graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor {
    context: Option<Iri>,
    attribute_contexts: BTreeMap<String, Iri>,
}

impl Descriptor {
    /// Creates a descriptor targeting the default graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the context for the whole resource.
    #[must_use]
    pub fn with_context(mut self, context: Iri) -> Self {
        self.context = Some(context);
        self
    }

    /// Overrides the context for a single attribute.
    #[must_use]
    pub fn with_attribute_context(mut self, attribute: impl Into<String>, context: Iri) -> Self {
        self.attribute_contexts.insert(attribute.into(), context);
        self
    }

    /// Returns the resource-level context.
    #[must_use]
    pub fn context(&self) -> Option<&Iri> {
        self.context.as_ref()
    }

    /// Returns the context an attribute resolves to, falling back to the
    /// resource-level context.
    #[must_use]
    pub fn attribute_context(&self, attribute: &str) -> Option<&Iri> {
        self.attribute_contexts
            .get(attribute)
            .or(self.context.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::Descriptor;
    use crate::model::value_objects::Iri;

    fn iri(text: &str) -> Iri {
        Iri::new(text).expect("valid iri")
    }

    #[test]
    fn attribute_context_falls_back_to_resource_context() {
        let descriptor = Descriptor::new()
            .with_context(iri("https://example.org/contexts/main"))
            .with_attribute_context("label", iri("https://example.org/contexts/labels"));

        assert_eq!(
            descriptor.attribute_context("label"),
            Some(&iri("https://example.org/contexts/labels"))
        );
        assert_eq!(
            descriptor.attribute_context("comment"),
            Some(&iri("https://example.org/contexts/main"))
        );
    }

    #[test]
    fn default_descriptor_targets_default_graph() {
        let descriptor = Descriptor::new();
        assert!(descriptor.context().is_none());
        assert!(descriptor.attribute_context("anything").is_none());
    }
}
