use dashmap::DashMap;
use tracing::trace;

use crate::config::CacheSettings;
use crate::model::descriptor::Descriptor;
use crate::model::instance::Instance;
use crate::model::value_objects::{Iri, NamedResource};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    type_name: String,
    identifier: NamedResource,
    context: Option<Iri>,
}

impl CacheKey {
    fn new(type_name: &str, identifier: &NamedResource, descriptor: &Descriptor) -> Self {
        Self {
            type_name: type_name.to_owned(),
            identifier: identifier.clone(),
            context: descriptor.context().cloned(),
        }
    }
}

/// Second-level cache shared across units of work.
///
/// Entries are keyed by managed type, identifier and descriptor context and
/// hold plain instances free of any transaction wiring. The sharded map
/// serializes writes against each other without blocking reads of unrelated
/// keys.
#[derive(Debug, Default)]
pub struct CacheManager {
    enabled: bool,
    entries: DashMap<CacheKey, Instance>,
}

impl CacheManager {
    /// Creates a cache configured by the persistence settings.
    #[must_use]
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            entries: DashMap::new(),
        }
    }

    /// Returns whether caching is enabled at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns a defensive copy of the cached instance, if present.
    #[must_use]
    pub fn get(
        &self,
        type_name: &str,
        identifier: &NamedResource,
        descriptor: &Descriptor,
    ) -> Option<Instance> {
        if !self.enabled {
            return None;
        }
        self.entries
            .get(&CacheKey::new(type_name, identifier, descriptor))
            .map(|entry| entry.value().clone())
    }

    /// Returns whether an instance is cached under the given key.
    #[must_use]
    pub fn contains(
        &self,
        type_name: &str,
        identifier: &NamedResource,
        descriptor: &Descriptor,
    ) -> bool {
        self.enabled
            && self
                .entries
                .contains_key(&CacheKey::new(type_name, identifier, descriptor))
    }

    /// Stores a defensive copy of an instance.
    pub fn add(&self, identifier: &NamedResource, descriptor: &Descriptor, instance: &Instance) {
        if !self.enabled {
            return;
        }
        self.entries.insert(
            CacheKey::new(instance.type_name(), identifier, descriptor),
            instance.clone(),
        );
    }

    /// Evicts one instance across all contexts.
    pub fn evict(&self, type_name: &str, identifier: &NamedResource) {
        self.entries
            .retain(|key, _| key.type_name != type_name || key.identifier != *identifier);
        trace!(type_name, identifier = %identifier, "evicted instance from cache");
    }

    /// Evicts every instance of a managed type.
    pub fn evict_type(&self, type_name: &str) {
        self.entries.retain(|key, _| key.type_name != type_name);
        trace!(type_name, "evicted type from cache");
    }

    /// Drops every entry.
    pub fn evict_all(&self) {
        self.entries.clear();
        trace!("evicted all cache entries");
    }

    /// Returns the number of cached instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
