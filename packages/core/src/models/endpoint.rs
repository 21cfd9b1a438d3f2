//! Endpoint Data Structures
//!
//! This module defines the `Endpoint` struct and related types for Mockwire's
//! hierarchical path tree. Every published resource (organization, project,
//! schema) owns exactly one endpoint row that fixes its position in the
//! URL namespace.
//!
//! # Architecture
//!
//! - **Materialized paths**: `full_path` stores the complete slash-joined path
//!   (`google/admin-backend/users`), so resolution is a single unique-key
//!   lookup instead of a parent-chain walk.
//! - **Kind-tagged resource reference**: `ResourceRef` carries exactly one
//!   owning resource id per variant, making the "exactly one reference, and it
//!   matches the kind" rule unrepresentable to violate in memory.
//! - **Validation at construction**: the `organization`/`project`/`schema`
//!   constructors are the only way to produce an `Endpoint`, and they validate
//!   slug format and parent depth rules before returning.
//!
//! # Examples
//!
//! ```rust
//! use mockwire_core::models::Endpoint;
//! use uuid::Uuid;
//!
//! let org = Endpoint::organization(Uuid::new_v4(), "google").unwrap();
//! assert_eq!(org.full_path, "google");
//!
//! let project = Endpoint::project(Uuid::new_v4(), &org, "admin-backend").unwrap();
//! assert_eq!(project.full_path, "google/admin-backend");
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

/// Maximum slug length, matching the `slug` column width.
const MAX_SLUG_LEN: usize = 255;

/// Slug format: lowercase alphanumeric segments separated by single hyphens,
/// no leading/trailing hyphen. A slug can never contain `/`, which keeps
/// `full_path` segmentation unambiguous.
const SLUG_PATTERN: &str = r"^[a-z0-9]+(-[a-z0-9]+)*$";

/// Validation errors for Endpoint construction and row decoding
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    #[error("Invalid parent for {kind} endpoint: {reason}")]
    InvalidParent { kind: EndpointKind, reason: String },

    #[error("Unknown endpoint kind: {0}")]
    UnknownKind(String),

    #[error("Endpoint row {id} must reference exactly one resource, found {count}")]
    ResourceReferenceCount { id: String, count: usize },

    #[error("Endpoint row {id} has kind {kind} but its resource reference disagrees")]
    KindMismatch { id: String, kind: EndpointKind },
}

/// Discriminator for the three levels of the path tree.
///
/// The kind determines which resource reference an endpoint carries and at
/// which depth it may appear: organizations at the root, projects beneath an
/// organization, schemas beneath a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Organization,
    Project,
    Schema,
}

impl EndpointKind {
    /// Stable string form used in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Organization => "organization",
            EndpointKind::Project => "project",
            EndpointKind::Schema => "schema",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "organization" => Ok(EndpointKind::Organization),
            "project" => Ok(EndpointKind::Project),
            "schema" => Ok(EndpointKind::Schema),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// The owning resource of an endpoint, tagged by kind.
///
/// Exactly one resource id per variant: the "exactly one foreign key is set,
/// and it matches the declared kind" invariant holds by construction. The
/// storage layer still persists three nullable columns (one per kind) and
/// re-validates them when decoding rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "resourceId", rename_all = "lowercase")]
pub enum ResourceRef {
    Organization(Uuid),
    Project(Uuid),
    Schema(Uuid),
}

impl ResourceRef {
    /// The kind implied by this reference.
    pub fn kind(&self) -> EndpointKind {
        match self {
            ResourceRef::Organization(_) => EndpointKind::Organization,
            ResourceRef::Project(_) => EndpointKind::Project,
            ResourceRef::Schema(_) => EndpointKind::Schema,
        }
    }

    /// The owning resource id, regardless of kind.
    pub fn resource_id(&self) -> Uuid {
        match self {
            ResourceRef::Organization(id)
            | ResourceRef::Project(id)
            | ResourceRef::Schema(id) => *id,
        }
    }
}

/// One entry in the path tree, representing an organization, project, or
/// schema position in the URL namespace.
///
/// # Fields
///
/// - `id`: stable identifier of the endpoint row itself
/// - `full_path`: globally unique slash-joined path (`google/admin-backend`)
/// - `slug`: this endpoint's own segment (`admin-backend`)
/// - `resource`: kind-tagged reference to the owning resource
/// - `parent_id`: parent endpoint row, `None` only for organizations
/// - `created_at` / `updated_at`: set by the database on insert/update
///
/// # Invariants
///
/// Constructors enforce: valid slug, parent kind one level above, and
/// `full_path == parent.full_path + "/" + slug` (or `slug` at the root).
/// Renames go through the service layer, which rewrites descendant paths in
/// the same transaction so the derivation never diverges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Unique identifier of the endpoint row
    pub id: Uuid,

    /// Full hierarchical path, globally unique
    pub full_path: String,

    /// This endpoint's own path segment
    pub slug: String,

    /// Owning resource, tagged by kind
    #[serde(flatten)]
    pub resource: ResourceRef,

    /// Parent endpoint row (`None` only for organizations)
    pub parent_id: Option<Uuid>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// Create a root endpoint for an organization.
    ///
    /// The full path of an organization endpoint is its slug.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSlug` if the slug fails format
    /// validation.
    pub fn organization(organization_id: Uuid, slug: &str) -> Result<Self, ValidationError> {
        validate_slug(slug)?;
        Ok(Self::assemble(
            ResourceRef::Organization(organization_id),
            None,
            slug.to_string(),
            slug.to_string(),
        ))
    }

    /// Create a project endpoint beneath an organization endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSlug` on bad slugs and
    /// `ValidationError::InvalidParent` if `parent` is not an organization
    /// endpoint.
    pub fn project(
        project_id: Uuid,
        parent: &Endpoint,
        slug: &str,
    ) -> Result<Self, ValidationError> {
        validate_slug(slug)?;
        if parent.kind() != EndpointKind::Organization {
            return Err(ValidationError::InvalidParent {
                kind: EndpointKind::Project,
                reason: format!("parent '{}' is a {}", parent.full_path, parent.kind()),
            });
        }
        Ok(Self::assemble(
            ResourceRef::Project(project_id),
            Some(parent.id),
            slug.to_string(),
            build_full_path(Some(parent), slug),
        ))
    }

    /// Create a schema endpoint beneath a project endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSlug` on bad slugs and
    /// `ValidationError::InvalidParent` if `parent` is not a project endpoint.
    pub fn schema(
        schema_id: Uuid,
        parent: &Endpoint,
        slug: &str,
    ) -> Result<Self, ValidationError> {
        validate_slug(slug)?;
        if parent.kind() != EndpointKind::Project {
            return Err(ValidationError::InvalidParent {
                kind: EndpointKind::Schema,
                reason: format!("parent '{}' is a {}", parent.full_path, parent.kind()),
            });
        }
        Ok(Self::assemble(
            ResourceRef::Schema(schema_id),
            Some(parent.id),
            slug.to_string(),
            build_full_path(Some(parent), slug),
        ))
    }

    fn assemble(
        resource: ResourceRef,
        parent_id: Option<Uuid>,
        slug: String,
        full_path: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_path,
            slug,
            resource,
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// The endpoint's kind, derived from its resource reference.
    pub fn kind(&self) -> EndpointKind {
        self.resource.kind()
    }

    /// The owning resource id.
    pub fn resource_id(&self) -> Uuid {
        self.resource.resource_id()
    }
}

/// Build a full path from an optional parent endpoint and a slug.
///
/// Root endpoints (no parent) use the bare slug.
pub fn build_full_path(parent: Option<&Endpoint>, slug: &str) -> String {
    match parent {
        None => slug.to_string(),
        Some(parent) => format!("{}/{}", parent.full_path, slug),
    }
}

/// Join path segments into the canonical full-path form.
///
/// Used by the resolver to build lookup keys from request segments without
/// consulting the database.
pub fn join_path(segments: &[&str]) -> String {
    segments.join("/")
}

/// Validate a slug: non-empty, within column width, lowercase alphanumeric
/// segments separated by single hyphens.
///
/// # Errors
///
/// Returns `ValidationError::InvalidSlug` with the failing reason.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    static SLUG_REGEX: OnceLock<Regex> = OnceLock::new();
    let slug_regex = SLUG_REGEX.get_or_init(|| Regex::new(SLUG_PATTERN).unwrap());

    if slug.is_empty() {
        return Err(ValidationError::InvalidSlug {
            slug: slug.to_string(),
            reason: "slug cannot be empty".to_string(),
        });
    }

    if slug.len() > MAX_SLUG_LEN {
        return Err(ValidationError::InvalidSlug {
            slug: slug.chars().take(32).collect(),
            reason: format!("slug exceeds {} characters", MAX_SLUG_LEN),
        });
    }

    if !slug_regex.is_match(slug) {
        return Err(ValidationError::InvalidSlug {
            slug: slug.to_string(),
            reason: "slugs are lowercase alphanumeric with single hyphen separators".to_string(),
        });
    }

    Ok(())
}

/// Result of a delete operation
///
/// # Examples
///
/// ```rust
/// use mockwire_core::models::DeleteResult;
///
/// let result = DeleteResult { existed: true };
/// assert!(result.existed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    /// Whether the endpoint existed before the delete
    pub existed: bool,
}

impl DeleteResult {
    /// A delete that removed an existing endpoint
    pub fn existed() -> Self {
        Self { existed: true }
    }

    /// A delete whose target was already gone
    pub fn not_found() -> Self {
        Self { existed: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> Endpoint {
        Endpoint::organization(Uuid::new_v4(), "google").unwrap()
    }

    #[test]
    fn test_organization_full_path_is_slug() {
        let endpoint = org();
        assert_eq!(endpoint.full_path, "google");
        assert_eq!(endpoint.slug, "google");
        assert_eq!(endpoint.kind(), EndpointKind::Organization);
        assert!(endpoint.parent_id.is_none());
    }

    #[test]
    fn test_project_path_joins_parent() {
        let parent = org();
        let project = Endpoint::project(Uuid::new_v4(), &parent, "admin-backend").unwrap();
        assert_eq!(project.full_path, "google/admin-backend");
        assert_eq!(project.slug, "admin-backend");
        assert_eq!(project.parent_id, Some(parent.id));
    }

    #[test]
    fn test_schema_requires_project_parent() {
        let parent = org();
        let err = Endpoint::schema(Uuid::new_v4(), &parent, "users").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParent { .. }));
    }

    #[test]
    fn test_project_requires_organization_parent() {
        let parent = org();
        let project = Endpoint::project(Uuid::new_v4(), &parent, "admin-backend").unwrap();
        let err = Endpoint::project(Uuid::new_v4(), &project, "nested").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidParent { .. }));
    }

    #[test]
    fn test_resource_ref_kind_agreement() {
        let id = Uuid::new_v4();
        assert_eq!(
            ResourceRef::Organization(id).kind(),
            EndpointKind::Organization
        );
        assert_eq!(ResourceRef::Project(id).kind(), EndpointKind::Project);
        assert_eq!(ResourceRef::Schema(id).kind(), EndpointKind::Schema);
        assert_eq!(ResourceRef::Schema(id).resource_id(), id);
    }

    #[test]
    fn test_slug_validation_rejects_separators() {
        for bad in ["", "Admin", "has space", "slash/inside", "-leading", "trailing-", "a--b"] {
            assert!(validate_slug(bad).is_err(), "slug {:?} should be rejected", bad);
        }
        for good in ["google", "admin-backend", "v2", "a", "user-profiles-2"] {
            assert!(validate_slug(good).is_ok(), "slug {:?} should be accepted", good);
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            EndpointKind::Organization,
            EndpointKind::Project,
            EndpointKind::Schema,
        ] {
            assert_eq!(kind.as_str().parse::<EndpointKind>().unwrap(), kind);
        }
        assert!("folder".parse::<EndpointKind>().is_err());
    }

    /// Contract test: the serialized form is what API layers upstream consume.
    /// `resource` flattens into `kind` + `resourceId` alongside the path fields.
    #[test]
    fn test_endpoint_serialization_contract() {
        let endpoint = org();
        let json = serde_json::to_value(&endpoint).unwrap();

        assert_eq!(json.get("fullPath").unwrap(), "google");
        assert_eq!(json.get("slug").unwrap(), "google");
        assert_eq!(json.get("kind").unwrap(), "organization");
        assert_eq!(
            json.get("resourceId").unwrap().as_str().unwrap(),
            endpoint.resource_id().to_string()
        );
        assert!(json.get("resource").is_none(), "resource must flatten, not nest");

        let back: Endpoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, endpoint);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(&["google"]), "google");
        assert_eq!(
            join_path(&["google", "admin-backend", "users"]),
            "google/admin-backend/users"
        );
    }
}
