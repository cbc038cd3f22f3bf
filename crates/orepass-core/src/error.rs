//! Error types for the orepass system.
//!
//! Read misses are deliberately NOT part of this taxonomy: lookup
//! operations return `Ok(None)` and reserve `NotFound` for flows that
//! require a record to proceed (e.g. assigning a role by name).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrepassError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Uniqueness violation (email, username, role name, token).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input rejected before reaching storage. The message names the
    /// violated rule and is safe to show to the caller.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Bad credentials, expired/revoked session, or inactive/deleted
    /// user. Carries no detail so responses cannot be used to probe
    /// which accounts exist.
    #[error("unauthorized")]
    Unauthorized,

    /// Pool, connection, or query failure. Fatal to the current
    /// request; detail is logged internally, not shown to callers.
    #[error("storage error: {0}")]
    Storage(String),
}

pub type OrepassResult<T> = Result<T, OrepassError>;
