use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::mapping::delta::FieldDelta;
use crate::model::axiom::Axiom;
use crate::model::descriptor::Descriptor;
use crate::model::value_objects::{Iri, NamedResource, Value};

/// Failure raised by a storage backend collaborator.
///
/// Storage failures are never swallowed: they abort the enclosing unit of
/// work operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// I/O or backend access failure.
    #[error("storage access failed: {0}")]
    Access(String),
    /// Failure at a transaction boundary.
    #[error("storage transaction failed: {0}")]
    Transaction(String),
    /// The backend could not mint a fresh identifier.
    #[error("identifier generation failed: {0}")]
    IdentifierGeneration(String),
}

impl StorageError {
    /// Shorthand for an access failure.
    #[must_use]
    pub fn access(message: impl Into<String>) -> Self {
        Self::Access(message.into())
    }

    /// Shorthand for a transaction failure.
    #[must_use]
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }
}

/// Named values passed to a native query execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryBindings {
    bindings: BTreeMap<String, Value>,
}

impl QueryBindings {
    /// Creates an empty binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value to a name, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Returns the value bound to a name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Iterates over all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// One row of a native query result, with positional columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryRow {
    columns: Vec<Value>,
}

impl QueryRow {
    /// Creates a row from its column values.
    #[must_use]
    pub fn new(columns: Vec<Value>) -> Self {
        Self { columns }
    }

    /// Returns the value of one column.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Value> {
        self.columns.get(index)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` for a row without columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Contract describing the storage backend responsibilities consumed by the
/// core.
///
/// Implementors translate these operations to a concrete triple store. All
/// I/O lives behind this port; the unit of work awaits each call
/// synchronously and never issues overlapping calls on one connection.
#[async_trait]
pub trait StorageConnector {
    /// Associated error type allowing backend specific failures.
    type Error;

    /// Returns every statement about the identified resource visible through
    /// the descriptor's contexts.
    async fn find_axioms(
        &self,
        subject: &NamedResource,
        descriptor: &Descriptor,
    ) -> Result<Vec<Axiom>, Self::Error>;

    /// Asserts the statements of a newly persisted resource.
    async fn persist(
        &self,
        subject: &NamedResource,
        axioms: Vec<Axiom>,
        descriptor: &Descriptor,
    ) -> Result<(), Self::Error>;

    /// Applies one attribute's statement-level changes.
    async fn merge_field(
        &self,
        subject: &NamedResource,
        delta: FieldDelta,
        descriptor: &Descriptor,
    ) -> Result<(), Self::Error>;

    /// Retracts every statement about the identified resource.
    async fn remove_by_identifier(
        &self,
        subject: &NamedResource,
        descriptor: &Descriptor,
    ) -> Result<(), Self::Error>;

    /// Mints a fresh identifier for an instance of the given ontology class.
    async fn generate_identifier(&self, class_iri: &Iri) -> Result<NamedResource, Self::Error>;

    /// Executes a fixed native query with the supplied bindings.
    async fn execute_native_query(
        &self,
        query: &str,
        bindings: &QueryBindings,
    ) -> Result<Vec<QueryRow>, Self::Error>;

    /// Opens the backend transaction.
    async fn begin(&self) -> Result<(), Self::Error>;

    /// Commits the backend transaction.
    async fn commit(&self) -> Result<(), Self::Error>;

    /// Rolls the backend transaction back.
    async fn rollback(&self) -> Result<(), Self::Error>;

    /// Returns whether the backend considers the repository consistent.
    async fn is_consistent(&self) -> Result<bool, Self::Error>;
}

/// Type alias simplifying connector trait object usage inside the session.
pub type ConnectorHandle = dyn StorageConnector<Error = StorageError> + Send + Sync + 'static;

/// Convenience check used by connector implementations: statements carrying
/// the absence sentinel are markers, not data, and must not be stored.
#[must_use]
pub fn is_storable(axiom: &Axiom) -> bool {
    !axiom.value().is_null()
}
