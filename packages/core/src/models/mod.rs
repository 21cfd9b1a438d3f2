//! Data Models
//!
//! This module contains the core data structures for the endpoint hierarchy:
//!
//! - `Endpoint` - one path-tree entry per organization, project, or schema
//! - `EndpointKind` / `ResourceRef` - the kind discriminator and the
//!   kind-tagged owning-resource reference
//!
//! Endpoints are only constructible through validating constructors, so the
//! structural invariants (slug format, parent depth rules, exactly one
//! resource reference) hold for every in-memory instance.

mod endpoint;

pub use endpoint::{
    build_full_path, join_path, validate_slug, DeleteResult, Endpoint, EndpointKind, ResourceRef,
    ValidationError,
};
