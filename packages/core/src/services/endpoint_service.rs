//! Endpoint Service - Path Resolution and Mutation
//!
//! This module provides the business logic layer for the endpoint hierarchy:
//!
//! - Creation of endpoints alongside their owning resources (organization,
//!   project, schema)
//! - Slug renames with atomic descendant-path cascades
//! - Deletes with subtree cascade
//! - Path resolution for the request-routing layer
//!
//! # Call Discipline
//!
//! Resource-owning collaborators call the mutation operations immediately
//! after persisting/renaming/deleting their own entity. The routing layer
//! calls `resolve_*` on every slug-addressed request; resolution is a single
//! unique-key lookup against the materialized `full_path`.
//!
//! # Duplicate Detection
//!
//! Every create/rename pre-checks the computed path for a fast, friendly
//! `DuplicatePath` error. The pre-check is an optimization, not the
//! correctness mechanism: two concurrent writers can both pass it, and the
//! loser's unique-constraint violation at commit is translated into the same
//! `DuplicatePath` the pre-check would have produced.

use crate::db::{EndpointEvent, EndpointStore};
use crate::models::{self, join_path, DeleteResult, Endpoint, EndpointKind};
use crate::services::error::EndpointServiceError;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Broadcast channel capacity for endpoint events.
///
/// 128 provides sufficient headroom for burst mutations while limiting
/// memory overhead. Observer lag is acceptable - a lagging resolution cache
/// falls back to re-resolving against the store.
const ENDPOINT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Business service for the endpoint path tree
///
/// Wraps an [`EndpointStore`] with the creation, rename-cascade, delete, and
/// resolution rules, and broadcasts [`EndpointEvent`]s after successful
/// mutations.
///
/// # Examples
///
/// ```rust,no_run
/// use mockwire_core::db::{DatabaseService, TursoStore};
/// use mockwire_core::services::EndpointService;
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/mockwire.db")).await?);
///     let service = EndpointService::new(Arc::new(TursoStore::new(db)));
///
///     let org_id = Uuid::new_v4();
///     service.create_organization_endpoint(org_id, "google").await?;
///     assert_eq!(service.resolve_organization("google").await?, org_id);
///     Ok(())
/// }
/// ```
pub struct EndpointService {
    store: Arc<dyn EndpointStore>,
    event_tx: broadcast::Sender<EndpointEvent>,
}

impl EndpointService {
    /// Create a new EndpointService over a store
    pub fn new(store: Arc<dyn EndpointStore>) -> Self {
        let (event_tx, _) = broadcast::channel(ENDPOINT_EVENT_CHANNEL_CAPACITY);
        Self { store, event_tx }
    }

    /// Subscribe to endpoint events
    ///
    /// Events are emitted after mutations commit. Receivers that fall behind
    /// see a `Lagged` error and should re-resolve from the store.
    pub fn subscribe(&self) -> broadcast::Receiver<EndpointEvent> {
        self.event_tx.subscribe()
    }

    //
    // MUTATIONS (called by resource-owning collaborators)
    //

    /// Create the root endpoint for a newly persisted organization
    ///
    /// The organization's slug becomes its full path.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` on a bad slug
    /// - `DuplicatePath` if the path is taken (pre-check or constraint)
    pub async fn create_organization_endpoint(
        &self,
        organization_id: Uuid,
        slug: &str,
    ) -> Result<Endpoint, EndpointServiceError> {
        let endpoint = Endpoint::organization(organization_id, slug)?;
        self.insert_endpoint(endpoint).await
    }

    /// Create the endpoint for a newly persisted project
    ///
    /// The parent organization endpoint must already exist; the project's
    /// full path is the organization path joined with the project slug.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` on a bad slug
    /// - `ParentNotFound` if the organization has no endpoint
    /// - `DuplicatePath` if the path is taken
    pub async fn create_project_endpoint(
        &self,
        project_id: Uuid,
        organization_id: Uuid,
        slug: &str,
    ) -> Result<Endpoint, EndpointServiceError> {
        let parent = self
            .store
            .find_by_resource(organization_id, EndpointKind::Organization)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| {
                EndpointServiceError::parent_not_found(
                    organization_id,
                    EndpointKind::Organization,
                )
            })?;

        let endpoint = Endpoint::project(project_id, &parent, slug)?;
        self.insert_endpoint(endpoint).await
    }

    /// Create the endpoint for a newly persisted schema
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` on a bad slug
    /// - `ParentNotFound` if the project has no endpoint
    /// - `DuplicatePath` if the path is taken
    pub async fn create_schema_endpoint(
        &self,
        schema_id: Uuid,
        project_id: Uuid,
        slug: &str,
    ) -> Result<Endpoint, EndpointServiceError> {
        let parent = self
            .store
            .find_by_resource(project_id, EndpointKind::Project)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| {
                EndpointServiceError::parent_not_found(project_id, EndpointKind::Project)
            })?;

        let endpoint = Endpoint::schema(schema_id, &parent, slug)?;
        self.insert_endpoint(endpoint).await
    }

    /// Shared insert path: friendly duplicate pre-check, store write with
    /// constraint translation, event emission.
    async fn insert_endpoint(
        &self,
        endpoint: Endpoint,
    ) -> Result<Endpoint, EndpointServiceError> {
        if self
            .store
            .path_exists(&endpoint.full_path)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
        {
            return Err(EndpointServiceError::duplicate_path(&endpoint.full_path));
        }

        let full_path = endpoint.full_path.clone();
        let created = self
            .store
            .create_endpoint(endpoint)
            .await
            .map_err(|e| EndpointServiceError::from_store(e, &full_path))?;

        tracing::debug!(path = %created.full_path, kind = %created.kind(), "Created endpoint");
        let _ = self.event_tx.send(EndpointEvent::Created {
            endpoint: created.clone(),
        });

        Ok(created)
    }

    /// Rename the endpoint owned by a resource, cascading to descendants
    ///
    /// Called when the owning resource's slug-bearing name changes. The
    /// endpoint's own slug and path change, and every descendant's path has
    /// the old prefix replaced with the new one — all in one atomic store
    /// transaction. A failure anywhere leaves every path untouched.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` on a bad slug
    /// - `EndpointNotFound` if the resource has no endpoint
    /// - `DuplicatePath` if the new path is taken (including the degenerate
    ///   rename-to-current-slug case; callers skip no-op renames)
    pub async fn rename_endpoint(
        &self,
        resource_id: Uuid,
        kind: EndpointKind,
        new_slug: &str,
    ) -> Result<Endpoint, EndpointServiceError> {
        models::validate_slug(new_slug)?;

        let endpoint = self
            .store
            .find_by_resource(resource_id, kind)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| EndpointServiceError::endpoint_not_found(resource_id, kind))?;

        let new_full_path = match endpoint.parent_id {
            None => new_slug.to_string(),
            Some(parent_id) => {
                let parent = self
                    .store
                    .get_endpoint(parent_id)
                    .await
                    .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
                    .ok_or_else(|| {
                        // A missing parent row means the tree itself is
                        // corrupt; surface it as a database-level failure.
                        EndpointServiceError::query_failed(format!(
                            "parent endpoint {} missing for {}",
                            parent_id, endpoint.full_path
                        ))
                    })?;
                format!("{}/{}", parent.full_path, new_slug)
            }
        };

        if self
            .store
            .path_exists(&new_full_path)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
        {
            return Err(EndpointServiceError::duplicate_path(&new_full_path));
        }

        let old_full_path = endpoint.full_path.clone();
        self.store
            .rename_endpoint(endpoint.id, new_slug, &new_full_path)
            .await
            .map_err(|e| EndpointServiceError::from_store(e, &new_full_path))?;

        tracing::debug!(
            old_path = %old_full_path,
            new_path = %new_full_path,
            "Renamed endpoint"
        );
        let _ = self.event_tx.send(EndpointEvent::Renamed {
            id: endpoint.id,
            old_path: old_full_path,
            new_path: new_full_path.clone(),
        });

        self.store
            .get_endpoint(endpoint.id)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| EndpointServiceError::endpoint_not_found(resource_id, kind))
    }

    /// Delete the endpoint owned by a resource
    ///
    /// Called when the owning resource is deleted. Descendant endpoints are
    /// removed in the same cascade, so no unreachable path rows survive a
    /// parent delete.
    ///
    /// # Errors
    ///
    /// `EndpointNotFound` if the resource has no endpoint.
    pub async fn delete_endpoint(
        &self,
        resource_id: Uuid,
        kind: EndpointKind,
    ) -> Result<DeleteResult, EndpointServiceError> {
        let endpoint = self
            .store
            .find_by_resource(resource_id, kind)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| EndpointServiceError::endpoint_not_found(resource_id, kind))?;

        let result = self
            .store
            .delete_endpoint(endpoint.id)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?;

        tracing::debug!(path = %endpoint.full_path, "Deleted endpoint");
        let _ = self.event_tx.send(EndpointEvent::Deleted {
            id: endpoint.id,
            full_path: endpoint.full_path,
        });

        Ok(result)
    }

    //
    // RESOLUTION (called by the request-routing layer)
    //

    /// Resolve an organization id from its slug
    ///
    /// Path: `{org}` — e.g. `google`
    pub async fn resolve_organization(
        &self,
        org_slug: &str,
    ) -> Result<Uuid, EndpointServiceError> {
        self.resolve_path(org_slug, EndpointKind::Organization)
            .await
    }

    /// Resolve a project id from its hierarchical path
    ///
    /// Path: `{org}/{project}` — e.g. `google/admin-backend`
    pub async fn resolve_project(
        &self,
        org_slug: &str,
        project_slug: &str,
    ) -> Result<Uuid, EndpointServiceError> {
        self.resolve_path(&join_path(&[org_slug, project_slug]), EndpointKind::Project)
            .await
    }

    /// Resolve a schema id from its hierarchical path
    ///
    /// Path: `{org}/{project}/{schema}` — e.g. `google/admin-backend/users`
    pub async fn resolve_schema(
        &self,
        org_slug: &str,
        project_slug: &str,
        schema_slug: &str,
    ) -> Result<Uuid, EndpointServiceError> {
        self.resolve_path(
            &join_path(&[org_slug, project_slug, schema_slug]),
            EndpointKind::Schema,
        )
        .await
    }

    /// Single lookup by materialized path, with the kind check
    ///
    /// A path that lands on an endpoint of the wrong kind reports the same
    /// `PathNotFound` as a missing path: callers asked for "the schema at
    /// this path", and there isn't one.
    async fn resolve_path(
        &self,
        full_path: &str,
        expected: EndpointKind,
    ) -> Result<Uuid, EndpointServiceError> {
        let endpoint = self
            .store
            .get_by_path(full_path)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| EndpointServiceError::path_not_found(full_path, expected))?;

        if endpoint.kind() != expected {
            return Err(EndpointServiceError::path_not_found(full_path, expected));
        }

        Ok(endpoint.resource_id())
    }

    //
    // LOOKUPS (collaborators, dashboards, admin views)
    //

    /// Get the endpoint owned by a resource
    pub async fn find_by_resource(
        &self,
        resource_id: Uuid,
        kind: EndpointKind,
    ) -> Result<Endpoint, EndpointServiceError> {
        self.store
            .find_by_resource(resource_id, kind)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))?
            .ok_or_else(|| EndpointServiceError::endpoint_not_found(resource_id, kind))
    }

    /// Get the whole endpoint row at a path, any kind
    pub async fn get_by_path(
        &self,
        full_path: &str,
    ) -> Result<Option<Endpoint>, EndpointServiceError> {
        self.store
            .get_by_path(full_path)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))
    }

    /// Check whether a path is taken
    pub async fn path_exists(&self, full_path: &str) -> Result<bool, EndpointServiceError> {
        self.store
            .path_exists(full_path)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))
    }

    /// Enumerate an endpoint and all its descendants, ordered by path
    pub async fn list_subtree(
        &self,
        full_path: &str,
    ) -> Result<Vec<Endpoint>, EndpointServiceError> {
        self.store
            .list_subtree(full_path)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))
    }

    /// Enumerate all endpoints of one kind, ordered by path
    pub async fn list_by_kind(
        &self,
        kind: EndpointKind,
    ) -> Result<Vec<Endpoint>, EndpointServiceError> {
        self.store
            .list_by_kind(kind)
            .await
            .map_err(|e| EndpointServiceError::query_failed(e.to_string()))
    }
}
