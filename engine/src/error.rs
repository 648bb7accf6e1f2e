//! Engine and store error types.

use thiserror::Error;

use crate::associations::ComponentSet;

/// Failure reported by a permission store adapter.
///
/// The engine passes these through unchanged and never retries: a retried
/// permission write that partially applied would leave an inconsistent
/// security state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Write conflicted with a concurrent writer.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    /// A referenced entity does not exist.
    #[error("Missing entity: {0}")]
    MissingEntity(String),
}

/// Engine error types.
#[derive(Debug, Error)]
pub enum RbacError {
    /// The supplied components cannot be routed to an association kind.
    #[error("No valid method of associating provided components: {0}")]
    InvalidAssociationRequest(ComponentSet),

    /// Capability invoked on an agent without a resolution strategy for it.
    #[error("Operation not supported by this agent: {0}")]
    UnsupportedOperation(&'static str),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for engine operations.
pub type RbacResult<T> = Result<T, RbacError>;
