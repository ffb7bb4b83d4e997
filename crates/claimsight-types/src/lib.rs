//! # claimsight-types
//!
//! Shared domain types for the ClaimSight system.
//!
//! This crate defines the core data structures used throughout the system:
//! - Claims: warranty repair records read from the relational store
//! - Clusters: disposable failure groupings recomputed from embeddings
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use claimsight_types::{Claim, Cluster};
//! ```

pub mod claim;
pub mod cluster;
pub mod config;
pub mod error;

pub use claim::Claim;
pub use cluster::{Cluster, Explanation, NewCluster};
pub use config::{
    ChatSettings, ClusteringSettings, EmbeddingSettings, Settings, VectorStoreSettings,
};
pub use error::ClaimSightError;
