//! Core Error Types

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Deterministic validation outcomes of core operations.
///
/// None of these are transient: the core has no network or disk fault
/// surface, so callers never retry internally. `InvalidState` is the one
/// exception to "recoverable" — it signals a broken internal invariant and
/// is logged as a bug at the point of detection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Node, assignment, or attribute not found")]
    NotFound,

    #[error("External key is already registered to a guild")]
    AlreadyRegistered,

    #[error("Identity already has an assignment in this guild")]
    AlreadyAssigned,

    #[error("Display name is already in use in this tree")]
    NameTaken,

    #[error("Referenced parent node does not exist or is not a valid parent")]
    InvalidParent,

    #[error("Attribute is already registered with a different type")]
    TypeConflict,

    #[error("Operation is not supported at this node level")]
    WrongLevel,

    #[error("Display name is required")]
    NameRequired,

    #[error("Display name exceeds maximum length")]
    NameTooLong,

    #[error("Maximum nodes per tree limit reached")]
    LimitExceeded,

    #[error("Internal invariant violated: {0}")]
    InvalidState(String),
}
