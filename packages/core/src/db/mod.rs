//! Database Layer
//!
//! This module handles all database interactions using libsql/SQLite:
//!
//! - Database initialization and connection management
//! - The `endpoints` table: materialized paths with a UNIQUE `full_path`
//! - Transactional rename cascades and cascading deletes
//!
//! # Architecture
//!
//! `DatabaseService` owns the connection and the raw `db_*` SQL operations.
//! The `EndpointStore` trait abstracts over it so business logic in
//! `EndpointService` never touches SQL; `TursoStore` is the libsql
//! implementation of that trait.

mod database;
mod endpoint_store;
mod error;
pub mod events;
mod turso_store;

pub use database::{DatabaseService, DbCreateEndpointParams};
pub use endpoint_store::EndpointStore;
pub use error::DatabaseError;
pub use events::EndpointEvent;
pub use turso_store::TursoStore;
