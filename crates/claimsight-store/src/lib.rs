//! # claimsight-store
//!
//! Persistence contracts for ClaimSight.
//!
//! The maintenance pipeline never talks to a database directly; it goes
//! through the [`ClaimStore`] and [`ClusterStore`] traits defined here. A
//! production deployment backs them with the relational store; tests and
//! local runs use the bundled [`InMemoryStore`].
//!
//! The traits encode the pipeline's transactional boundaries: marking a
//! batch embedded, replacing the entire cluster partition, and storing a
//! batch of explanations are each a single call, applied as one unit.

mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use store::{ClaimStore, ClusterStore, ComponentCost};
