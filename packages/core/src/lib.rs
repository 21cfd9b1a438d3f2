//! Mockwire Core - Endpoint Hierarchy Layer
//!
//! This crate provides the hierarchical namespace behind Mockwire's
//! slug-addressed mock APIs: every organization, project, and schema owns an
//! endpoint row in a three-level path tree (`google/admin-backend/users`),
//! and every inbound request resolves through it.
//!
//! # Architecture
//!
//! - **Materialized paths**: `full_path` is stored complete and guarded by a
//!   UNIQUE constraint, so resolution is one indexed lookup
//! - **Atomic rename cascades**: renaming a slug rewrites every descendant
//!   path in a single transaction
//! - **libsql/SQLite**: embedded database, WAL mode, cascading deletes
//!
//! # Modules
//!
//! - [`models`] - Data structures (Endpoint, EndpointKind, ResourceRef)
//! - [`services`] - Business services (EndpointService)
//! - [`db`] - Database layer with libsql integration

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::*;
pub use models::*;
pub use services::*;
