//! Error type for operations that can be synchronously rejected.
//!
//! Most mutation APIs on [`crate::entity::IntEntity`] follow the sentinel-return
//! convention documented alongside them (a no-op, `false`, or `None` on a
//! deleted entity or unknown class) rather than raising. `EcsError` covers the
//! remaining cases that are rejected before any mutation happens: duplicate
//! component types passed to `create_entity`, pool exhaustion, and a
//! `ClassIndex` that has registered more distinct types than it has room for.

use std::fmt;

/// Errors raised synchronously at an operation boundary.
///
/// Optimistic-lock contention (`concurrent-retry` in the design notes) is
/// never surfaced here: it is retried internally by [`crate::pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A named implementation could not be resolved. Kept for completeness of
    /// the error table; this crate has no implementation-discovery-by-name
    /// surface, so nothing in this crate raises it today.
    NotFound(String),
    /// `create_entity` was given two components of the same type.
    InvalidComponent,
    /// A tenant's chunk-id space is exhausted (chunk count would exceed
    /// `1 << C`).
    PoolFull,
    /// A mutation targeted an entity whose composition pointer is already
    /// null. Most call sites treat this as a no-op sentinel rather than
    /// propagating this variant; it exists for callers that want to
    /// distinguish "nothing happened because the entity is gone" from other
    /// failure.
    DeletedEntity,
    /// `componentIndex` lookup was for a class absent from the target
    /// composition.
    UnknownClass,
    /// `ClassIndex` was asked to register more than `K` distinct types.
    CapacityExceeded,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::NotFound(name) => write!(f, "implementation not found: {name}"),
            EcsError::InvalidComponent => {
                write!(f, "create_entity received two components of the same type")
            }
            EcsError::PoolFull => write!(f, "pool exhausted: chunk-id space consumed"),
            EcsError::DeletedEntity => write!(f, "operation attempted on a deleted entity"),
            EcsError::UnknownClass => write!(f, "component class absent from composition"),
            EcsError::CapacityExceeded => write!(f, "class index capacity exceeded"),
        }
    }
}

impl std::error::Error for EcsError {}

pub type Result<T> = std::result::Result<T, EcsError>;
