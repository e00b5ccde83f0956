use thiserror::Error;

use crate::mapping::MappingError;
use crate::metamodel::MetamodelError;
use crate::session::connector::StorageError;
use crate::session::unit_of_work::UsageError;

/// Aggregated error surface of the persistence engine.
///
/// Each concern keeps its own error type next to its module; this enum is
/// what session-level operations return.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed mapping declarations, surfaced at startup.
    #[error(transparent)]
    Metamodel(#[from] MetamodelError),
    /// Per-operation conversion failure between instances and statements.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// Storage collaborator failure; always aborts the enclosing operation.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Local programming error, fatal to the call only.
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
