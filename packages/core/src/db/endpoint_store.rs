//! EndpointStore Trait - Database Abstraction Layer
//!
//! This module defines the `EndpointStore` trait that abstracts persistence
//! for the endpoint path tree. The trait is the seam between `EndpointService`
//! (business logic) and the database implementation, so the backend can change
//! without touching the resolver and mutator logic.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async to support both embedded and
//!    network backends
//! 2. **Error Handling**: Uses `anyhow::Result` for flexible error context;
//!    implementations attach context with `.context()` so the underlying
//!    [`crate::db::DatabaseError`] stays downcastable (the service layer
//!    relies on this to recognize unique-constraint violations)
//! 3. **Atomicity**: `rename_endpoint` owns the whole rename cascade as a
//!    single transactional operation — partial rewrites must never be
//!    observable through any implementation
//!
//! # Examples
//!
//! ```rust,no_run
//! use mockwire_core::db::{DatabaseService, EndpointStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/mockwire.db")).await?);
//!     let store: Arc<dyn EndpointStore> = Arc::new(TursoStore::new(db));
//!
//!     let endpoint = store.get_by_path("google/admin-backend").await?;
//!
//!     Ok(())
//! }
//! ```

use crate::models::{DeleteResult, Endpoint, EndpointKind};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Abstraction layer for endpoint persistence operations
///
/// Implementations must be `Send + Sync` to allow usage in async contexts
/// where futures may be moved between threads.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    /// Persist a new endpoint
    ///
    /// # Errors
    ///
    /// Fails with a unique-violation `DatabaseError` (downcastable through
    /// the anyhow chain) if the endpoint's `full_path` — or its resource
    /// reference — is already taken.
    async fn create_endpoint(&self, endpoint: Endpoint) -> Result<Endpoint>;

    /// Get endpoint by row id
    ///
    /// Returns `Ok(None)` if no such endpoint exists (not an error).
    async fn get_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>>;

    /// Get endpoint by its full path — the resolver's primary lookup
    async fn get_by_path(&self, full_path: &str) -> Result<Option<Endpoint>>;

    /// Get the endpoint owned by a resource of the given kind
    async fn find_by_resource(
        &self,
        resource_id: Uuid,
        kind: EndpointKind,
    ) -> Result<Option<Endpoint>>;

    /// Check whether a full path is already taken
    async fn path_exists(&self, full_path: &str) -> Result<bool>;

    /// Get all direct children of an endpoint, ordered by path
    async fn get_children(&self, parent_id: Uuid) -> Result<Vec<Endpoint>>;

    /// Get an endpoint and all its descendants, ordered by path
    ///
    /// Matches the endpoint at `full_path` and everything below it; sibling
    /// paths that merely share a byte prefix are not included.
    async fn list_subtree(&self, full_path: &str) -> Result<Vec<Endpoint>>;

    /// Get all endpoints of one kind, ordered by path
    async fn list_by_kind(&self, kind: EndpointKind) -> Result<Vec<Endpoint>>;

    /// Rename an endpoint and rewrite every descendant path
    ///
    /// The caller provides the already-computed new full path (parent path
    /// joined with `new_slug`). The rename and the descendant rewrite commit
    /// as one atomic unit; on any failure nothing changes.
    ///
    /// # Errors
    ///
    /// Fails with a unique-violation `DatabaseError` if `new_full_path` is
    /// taken at commit time.
    async fn rename_endpoint(&self, id: Uuid, new_slug: &str, new_full_path: &str) -> Result<()>;

    /// Delete an endpoint and (by cascade) its descendants
    ///
    /// Idempotent: deleting a non-existent endpoint reports
    /// `existed == false` rather than failing.
    async fn delete_endpoint(&self, id: Uuid) -> Result<DeleteResult>;

    /// Close the store, flushing pending writes
    async fn close(&self) -> Result<()>;
}
