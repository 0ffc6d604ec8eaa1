//! Core library for the Chord ring simulation.
//!
//! This crate provides:
//! - [`id`] — the identifier space, its hash contract, and arc-interval predicates
//! - [`node`] — ring member identity and finger-table entries
//! - [`chord`] — the per-node Chord state machine (lookup, join, leave, stabilization)
//! - [`registry`] — the ring-wide coordinator that dispatches node-to-node calls
//! - [`report`] — serializable introspection snapshots

pub mod chord;
pub mod error;
pub mod id;
pub mod node;
pub mod registry;
pub mod report;

pub use chord::Chord;
pub use error::{ChordError, Result};
pub use id::{Id, IdSpace};
pub use node::{FingerEntry, Node};
pub use registry::RingManager;
pub use report::{ring_summary, FingerReport, NodeReport, ResourceReport, RingSummary};
