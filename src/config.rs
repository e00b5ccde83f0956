//! Persistence unit settings.
//!
//! Settings are plain data deserialized by the embedding application's
//! configuration layer and handed to [`crate::session::Session::new`].

use serde::{Deserialize, Serialize};

use crate::model::descriptor::Descriptor;
use crate::model::value_objects::{Iri, IriError};

/// Settings of one persistence unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Default language tag applied to plain string literals of attributes
    /// that do not declare their own.
    #[serde(default)]
    pub language: Option<String>,
    /// Default named-graph context resources are read from and written to
    /// when a descriptor does not override it.
    #[serde(default)]
    pub default_context: Option<String>,
    /// Second-level cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
}

impl PersistenceSettings {
    /// Builds the descriptor resources resolve to when the caller supplies
    /// none, honouring the configured default context.
    pub fn default_descriptor(&self) -> Result<Descriptor, IriError> {
        match &self.default_context {
            Some(context) => Ok(Descriptor::new().with_context(Iri::new(context.clone())?)),
            None => Ok(Descriptor::new()),
        }
    }
}

/// Second-level cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Whether the shared cache is consulted and populated at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}
