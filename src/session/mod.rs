//! Transactional session layer: the storage connector port, the shared
//! second-level cache and the per-transaction unit of work.

pub mod cache;
pub mod connector;
pub mod unit_of_work;

use std::sync::Arc;

use tracing::debug;

use crate::config::PersistenceSettings;
use crate::metamodel::Metamodel;
use crate::model::descriptor::Descriptor;
use crate::model::value_objects::IriError;

pub use cache::CacheManager;
pub use connector::{
    ConnectorHandle, QueryBindings, QueryRow, StorageConnector, StorageError,
};
pub use unit_of_work::{TransactionState, UnitOfWork, UsageError};

/// Entry point of one persistence unit: wires the immutable metamodel, the
/// storage collaborator and the shared cache together and hands out units of
/// work.
#[derive(Clone)]
pub struct Session {
    metamodel: Arc<Metamodel>,
    connector: Arc<ConnectorHandle>,
    cache: Arc<CacheManager>,
    settings: PersistenceSettings,
}

impl Session {
    /// Creates a session over a built metamodel and a connector handle.
    #[must_use]
    pub fn new(
        metamodel: Arc<Metamodel>,
        connector: Arc<ConnectorHandle>,
        settings: PersistenceSettings,
    ) -> Self {
        debug!(cache_enabled = settings.cache.enabled, "session created");
        Self {
            metamodel,
            connector,
            cache: Arc::new(CacheManager::new(&settings.cache)),
            settings,
        }
    }

    /// Acquires a fresh unit of work over the shared collaborators.
    #[must_use]
    pub fn acquire_unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(
            Arc::clone(&self.metamodel),
            Arc::clone(&self.connector),
            Arc::clone(&self.cache),
        )
    }

    /// Returns the metamodel of this persistence unit.
    #[must_use]
    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    /// Returns the shared second-level cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Returns the active settings.
    #[must_use]
    pub fn settings(&self) -> &PersistenceSettings {
        &self.settings
    }

    /// Builds the descriptor resources resolve to when the caller supplies
    /// none.
    pub fn default_descriptor(&self) -> Result<Descriptor, IriError> {
        self.settings.default_descriptor()
    }

    /// Releases the live object cache.
    pub fn release(&self) {
        self.cache.evict_all();
    }
}
