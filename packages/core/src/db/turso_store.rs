//! TursoStore - EndpointStore Implementation for the libsql Backend
//!
//! This module implements the `EndpointStore` trait over [`DatabaseService`],
//! handling `libsql::Row` → `Endpoint` conversion and keeping the SQL layer
//! free of business logic.
//!
//! # Design Principles
//!
//! 1. **Pure Delegation**: All methods delegate to DatabaseService `db_*`
//!    operations
//! 2. **Row Conversion**: `row_to_endpoint` is the single conversion point
//!    for every query
//! 3. **Invariant Guard on decode**: rows with zero or multiple resource
//!    references, or a kind that disagrees with the populated column, fail
//!    conversion — corrupt data is surfaced, never silently corrected

use crate::db::endpoint_store::EndpointStore;
use crate::db::{DatabaseService, DbCreateEndpointParams};
use crate::models::{DeleteResult, Endpoint, EndpointKind, ResourceRef, ValidationError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Row;
use std::sync::Arc;
use uuid::Uuid;

/// TursoStore implements EndpointStore for the libsql backend
///
/// A thin wrapper around [`DatabaseService`]; see the trait docs for the
/// operation contracts.
pub struct TursoStore {
    /// Underlying database service (extracted SQL operations)
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Create a new TursoStore wrapper
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Old data might use RFC3339: "YYYY-MM-DDTHH:MM:SSZ"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Convert libsql::Row to Endpoint model
    ///
    /// This is the central conversion point for all query operations, and the
    /// decode half of the invariant guard: exactly one resource column must be
    /// populated, and it must agree with the stored `kind` discriminator.
    ///
    /// # Row Format
    ///
    /// Expected columns (in order):
    /// - id (TEXT, UUID)
    /// - full_path (TEXT)
    /// - slug (TEXT)
    /// - kind (TEXT)
    /// - parent_id (TEXT, nullable)
    /// - organization_id (TEXT, nullable)
    /// - project_id (TEXT, nullable)
    /// - schema_id (TEXT, nullable)
    /// - created_at (TEXT)
    /// - updated_at (TEXT)
    fn row_to_endpoint(row: &Row) -> Result<Endpoint> {
        let id: String = row.get(0).context("Failed to get id")?;
        let full_path: String = row.get(1).context("Failed to get full_path")?;
        let slug: String = row.get(2).context("Failed to get slug")?;
        let kind_str: String = row.get(3).context("Failed to get kind")?;
        let parent_id: Option<String> = row.get(4).context("Failed to get parent_id")?;
        let organization_id: Option<String> =
            row.get(5).context("Failed to get organization_id")?;
        let project_id: Option<String> = row.get(6).context("Failed to get project_id")?;
        let schema_id: Option<String> = row.get(7).context("Failed to get schema_id")?;
        let created_at_str: String = row.get(8).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(9).context("Failed to get updated_at")?;

        let kind: EndpointKind = kind_str
            .parse()
            .with_context(|| format!("Endpoint row {} has unknown kind", id))?;

        let populated = [&organization_id, &project_id, &schema_id]
            .iter()
            .filter(|c| c.is_some())
            .count();
        if populated != 1 {
            return Err(ValidationError::ResourceReferenceCount {
                id,
                count: populated,
            }
            .into());
        }

        let resource = match (kind, &organization_id, &project_id, &schema_id) {
            (EndpointKind::Organization, Some(rid), None, None) => {
                ResourceRef::Organization(Self::parse_uuid(rid, "organization_id")?)
            }
            (EndpointKind::Project, None, Some(rid), None) => {
                ResourceRef::Project(Self::parse_uuid(rid, "project_id")?)
            }
            (EndpointKind::Schema, None, None, Some(rid)) => {
                ResourceRef::Schema(Self::parse_uuid(rid, "schema_id")?)
            }
            _ => return Err(ValidationError::KindMismatch { id, kind }.into()),
        };

        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let updated_at =
            Self::parse_timestamp(&updated_at_str).context("Failed to parse updated_at")?;

        Ok(Endpoint {
            id: Self::parse_uuid(&id, "id")?,
            full_path,
            slug,
            resource,
            parent_id: parent_id
                .map(|p| Self::parse_uuid(&p, "parent_id"))
                .transpose()?,
            created_at,
            updated_at,
        })
    }

    fn parse_uuid(s: &str, column: &str) -> Result<Uuid> {
        Uuid::parse_str(s).with_context(|| format!("Failed to parse {} '{}' as UUID", column, s))
    }

    /// Drain a row stream into endpoints
    async fn collect_endpoints(mut rows: libsql::Rows) -> Result<Vec<Endpoint>> {
        let mut endpoints = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            endpoints.push(Self::row_to_endpoint(&row)?);
        }
        Ok(endpoints)
    }
}

#[async_trait]
impl EndpointStore for TursoStore {
    async fn create_endpoint(&self, endpoint: Endpoint) -> Result<Endpoint> {
        let id = endpoint.id.to_string();
        let parent_id = endpoint.parent_id.map(|p| p.to_string());
        let resource_id = endpoint.resource_id().to_string();

        // The tagged union picks the column; the other two stay NULL.
        let (organization_id, project_id, schema_id) = match endpoint.resource {
            ResourceRef::Organization(_) => (Some(resource_id.as_str()), None, None),
            ResourceRef::Project(_) => (None, Some(resource_id.as_str()), None),
            ResourceRef::Schema(_) => (None, None, Some(resource_id.as_str())),
        };

        let params = DbCreateEndpointParams {
            id: &id,
            full_path: &endpoint.full_path,
            slug: &endpoint.slug,
            kind: endpoint.kind().as_str(),
            parent_id: parent_id.as_deref(),
            organization_id,
            project_id,
            schema_id,
        };

        self.db
            .db_insert_endpoint(params)
            .await
            .context("Failed to create endpoint")?;

        // Fetch back so timestamps reflect what the database committed
        self.get_endpoint(endpoint.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Endpoint not found after creation"))
    }

    async fn get_endpoint(&self, id: Uuid) -> Result<Option<Endpoint>> {
        match self
            .db
            .db_get_endpoint(&id.to_string())
            .await
            .context("Failed to get endpoint")?
        {
            Some(row) => Ok(Some(Self::row_to_endpoint(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_path(&self, full_path: &str) -> Result<Option<Endpoint>> {
        match self
            .db
            .db_get_by_full_path(full_path)
            .await
            .context("Failed to get endpoint by path")?
        {
            Some(row) => Ok(Some(Self::row_to_endpoint(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_resource(
        &self,
        resource_id: Uuid,
        kind: EndpointKind,
    ) -> Result<Option<Endpoint>> {
        match self
            .db
            .db_find_by_resource(kind.as_str(), &resource_id.to_string())
            .await
            .context("Failed to find endpoint by resource")?
        {
            Some(row) => Ok(Some(Self::row_to_endpoint(&row)?)),
            None => Ok(None),
        }
    }

    async fn path_exists(&self, full_path: &str) -> Result<bool> {
        self.db
            .db_path_exists(full_path)
            .await
            .context("Failed to check path existence")
    }

    async fn get_children(&self, parent_id: Uuid) -> Result<Vec<Endpoint>> {
        let rows = self
            .db
            .db_get_children(&parent_id.to_string())
            .await
            .context("Failed to get children")?;
        Self::collect_endpoints(rows).await
    }

    async fn list_subtree(&self, full_path: &str) -> Result<Vec<Endpoint>> {
        let rows = self
            .db
            .db_list_subtree(full_path)
            .await
            .context("Failed to list subtree")?;
        Self::collect_endpoints(rows).await
    }

    async fn list_by_kind(&self, kind: EndpointKind) -> Result<Vec<Endpoint>> {
        let rows = self
            .db
            .db_list_by_kind(kind.as_str())
            .await
            .context("Failed to list endpoints by kind")?;
        Self::collect_endpoints(rows).await
    }

    async fn rename_endpoint(&self, id: Uuid, new_slug: &str, new_full_path: &str) -> Result<()> {
        self.db
            .db_rename_endpoint(&id.to_string(), new_slug, new_full_path)
            .await
            .context("Failed to rename endpoint")?;
        Ok(())
    }

    async fn delete_endpoint(&self, id: Uuid) -> Result<DeleteResult> {
        let rows_affected = self
            .db
            .db_delete_endpoint(&id.to_string())
            .await
            .context("Failed to delete endpoint")?;

        Ok(DeleteResult {
            existed: rows_affected > 0,
        })
    }

    async fn close(&self) -> Result<()> {
        self.db.db_close().await.context("Failed to close database")
    }
}
