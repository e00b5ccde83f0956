use std::collections::BTreeMap;

use super::value_objects::{Iri, IriError};

const PREFIX_SEPARATOR: char = ':';

/// Registry of namespace prefixes used to resolve prefixed names into
/// absolute IRIs during metamodel assembly.
///
/// The well-known `rdf`, `rdfs` and `xsd` prefixes are registered by default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespaceResolver {
    namespaces: BTreeMap<String, String>,
}

impl Default for NamespaceResolver {
    fn default() -> Self {
        let mut resolver = Self {
            namespaces: BTreeMap::new(),
        };
        resolver.register("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#");
        resolver.register("rdfs", "http://www.w3.org/2000/01/rdf-schema#");
        resolver.register("xsd", "http://www.w3.org/2001/XMLSchema#");
        resolver
    }
}

impl NamespaceResolver {
    /// Creates a resolver with the default prefixes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prefix, replacing any previous registration.
    pub fn register(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.namespaces.insert(prefix.into(), namespace.into());
    }

    /// Returns the namespace registered for a prefix.
    #[must_use]
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    /// Resolves possibly prefixed text into an absolute [`Iri`].
    ///
    /// Text whose prefix is not registered is validated as an absolute IRI
    /// as-is.
    pub fn resolve(&self, value: &str) -> Result<Iri, IriError> {
        if let Some((prefix, local)) = value.split_once(PREFIX_SEPARATOR) {
            if let Some(namespace) = self.namespaces.get(prefix) {
                return Iri::new(format!("{namespace}{local}"));
            }
        }
        Iri::new(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::NamespaceResolver;

    #[test]
    fn resolves_registered_prefix() {
        let mut resolver = NamespaceResolver::new();
        resolver.register("ex", "https://example.org/");
        let iri = resolver.resolve("ex:Person").expect("resolved");
        assert_eq!(iri.as_str(), "https://example.org/Person");
    }

    #[test]
    fn default_prefixes_are_available() {
        let resolver = NamespaceResolver::new();
        let iri = resolver.resolve("rdfs:label").expect("resolved");
        assert_eq!(iri.as_str(), "http://www.w3.org/2000/01/rdf-schema#label");
    }

    #[test]
    fn absolute_iri_passes_through_unchanged() {
        let resolver = NamespaceResolver::new();
        let iri = resolver
            .resolve("https://example.org/Person")
            .expect("absolute");
        assert_eq!(iri.as_str(), "https://example.org/Person");
    }

    #[test]
    fn invalid_unprefixed_text_is_rejected() {
        let resolver = NamespaceResolver::new();
        assert!(resolver.resolve("not an iri").is_err());
    }
}
