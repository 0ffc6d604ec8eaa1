//! Error types for the core library.

use crate::id::Id;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, ChordError>;

/// Errors a [`crate::registry::RingManager`] can report at its public boundary.
///
/// Stale-peer and hop-limit conditions encountered *inside* a traversal are
/// not represented here — the algorithm defines a fallback for both, and they
/// are only surfaced as `tracing::warn!` events, never as a returned error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChordError {
    #[error("node id {id} (ip {ip:?}) already present in the ring")]
    DuplicateIdentity { id: Id, ip: String },

    #[error("no node found for ip {0:?}")]
    UnknownNode(String),

    #[error("the ring is empty")]
    EmptyRing,
}
