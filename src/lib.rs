//! Object-to-graph persistence engine for ontology triple stores.
//!
//! The crate maps typed, in-memory object graphs to and from subject–
//! predicate–value statements and manages the lifetime of that mapping under
//! transactional semantics:
//!
//! - the [`metamodel`] is the static, built-once registry of managed types,
//!   their identifiers and attribute descriptors;
//! - the [`mapping`] layer converts between instances and statements, one
//!   polymorphic strategy per attribute kind, including ordered sequences and
//!   query-derived attributes;
//! - the [`session`] layer holds the storage connector port, the shared
//!   second-level cache and the per-transaction [`session::UnitOfWork`],
//!   which clones managed instances, detects per-attribute changes and
//!   merges them back atomically.
//!
//! Storage backends are external collaborators behind
//! [`session::StorageConnector`]; the engine itself performs no I/O.

pub mod config;
pub mod error;
pub mod mapping;
pub mod metamodel;
pub mod model;
pub mod session;

pub use config::{CacheSettings, PersistenceSettings};
pub use error::{Error, Result};
pub use mapping::{ChangeSet, FieldDelta, MappingError, ObjectGraphMapper};
pub use metamodel::{
    AttributeDescriptor, AttributeKind, Cardinality, FetchType, IdentifierDescriptor, ManagedType,
    Metamodel, MetamodelBuilder, MetamodelError, ParticipationConstraint, SequenceLayout,
    TypeMapping, ValueConverter,
};
pub use model::{
    Assertion, AssertionKind, Axiom, Descriptor, FieldState, FieldValue, Instance, Iri, IriError,
    Literal, NamedResource, NamespaceResolver, Value,
};
pub use session::{
    CacheManager, QueryBindings, QueryRow, Session, StorageConnector, StorageError,
    TransactionState, UnitOfWork, UsageError,
};
