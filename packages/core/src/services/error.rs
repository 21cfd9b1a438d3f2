//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations, providing
//! detailed error handling for endpoint business logic failures.

use crate::db::DatabaseError;
use crate::models::{EndpointKind, ValidationError};
use thiserror::Error;
use uuid::Uuid;

/// Service operation errors
///
/// Provides high-level error types for all endpoint operations, with
/// detailed context and proper error chaining.
#[derive(Error, Debug)]
pub enum EndpointServiceError {
    /// A create or rename computed a full path that already exists.
    ///
    /// Produced by the friendly pre-check or by translating the store's
    /// unique-constraint violation when two writers race past the pre-check —
    /// the caller sees the same error either way. Never retried
    /// automatically.
    #[error("Endpoint path already exists: {path}")]
    DuplicatePath { path: String },

    /// No endpoint at the resolved path, or the endpoint there is of a
    /// different kind than the caller expected
    #[error("No {expected} found at path: {path}")]
    PathNotFound {
        path: String,
        expected: EndpointKind,
    },

    /// No endpoint owned by the given resource
    #[error("Endpoint not found for {kind} {resource_id}")]
    EndpointNotFound {
        resource_id: Uuid,
        kind: EndpointKind,
    },

    /// The parent resource has no endpoint to attach a child under
    #[error("Parent {kind} endpoint not found for resource {resource_id}")]
    ParentNotFound {
        resource_id: Uuid,
        kind: EndpointKind,
    },

    /// Validation failed for an endpoint (bad slug, depth rule, corrupt row).
    /// Programming-error class: fatal to the operation, never corrected.
    #[error("Endpoint validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),

    /// Store query failed without a recognizable database error
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl EndpointServiceError {
    /// Create a duplicate path error
    pub fn duplicate_path(path: impl Into<String>) -> Self {
        Self::DuplicatePath { path: path.into() }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>, expected: EndpointKind) -> Self {
        Self::PathNotFound {
            path: path.into(),
            expected,
        }
    }

    /// Create an endpoint not found error
    pub fn endpoint_not_found(resource_id: Uuid, kind: EndpointKind) -> Self {
        Self::EndpointNotFound { resource_id, kind }
    }

    /// Create a parent not found error
    pub fn parent_not_found(resource_id: Uuid, kind: EndpointKind) -> Self {
        Self::ParentNotFound { resource_id, kind }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Translate a store-layer error, mapping unique-constraint violations
    /// on the given path to `DuplicatePath`.
    ///
    /// The store trait surfaces `anyhow::Error`; the original
    /// [`DatabaseError`] stays downcastable through the context chain, which
    /// is what lets a lost insert race produce the same error a pre-check
    /// failure would have.
    pub fn from_store(err: anyhow::Error, path: &str) -> Self {
        match err.downcast::<DatabaseError>() {
            Ok(db_err) if db_err.is_unique_violation() => Self::duplicate_path(path),
            Ok(db_err) => Self::DatabaseError(db_err),
            Err(other) => Self::query_failed(other.to_string()),
        }
    }
}
