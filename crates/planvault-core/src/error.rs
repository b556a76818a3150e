use thiserror::Error;

/// Failure modes of a plan operation.
///
/// The transport boundary maps each variant to an HTTP status; nothing in
/// this crate knows about status codes. `NotFound` deliberately covers both
/// a missing row and an ownership mismatch so callers cannot probe for the
/// existence of other owners' plans.
#[derive(Debug, Error)]
pub enum OpError {
    /// The request had no `op` field.
    #[error("missing 'op'")]
    MissingOp,

    /// The `op` field named no known operation.
    #[error("unknown op {0:?}")]
    UnknownOp(String),

    /// A required payload field was absent or had the wrong type.
    #[error("{0}")]
    Validation(String),

    /// Target row absent, or owned by a different principal.
    #[error("plan not found")]
    NotFound,

    /// Optimistic version check failed; carries the authoritative version
    /// so the caller can re-read and resubmit.
    #[error("version conflict: current version is {current_version}")]
    VersionConflict { current_version: i64 },

    /// Rollback target version has no history entry.
    #[error("no snapshot at version {target_version}")]
    SnapshotNotFound { target_version: i64 },

    /// Unexpected failure from the persistence layer. Not retried.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
