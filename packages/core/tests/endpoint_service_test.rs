//! Integration tests for EndpointService
//!
//! Tests cover:
//! - Endpoint creation for all three resource kinds
//! - Path resolution (the routing layer's read path)
//! - Duplicate detection on create
//! - Kind-mismatch handling
//! - Deletion with subtree cascade
//! - Event emission after committed mutations

use mockwire_core::db::{DatabaseService, EndpointEvent, TursoStore};
use mockwire_core::models::EndpointKind;
use mockwire_core::services::{EndpointService, EndpointServiceError};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

async fn create_test_service() -> (EndpointService, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::new(db_path).await.expect("database"));
    (EndpointService::new(Arc::new(TursoStore::new(db))), temp_dir)
}

/// Create the standard three-level fixture and return the resource ids.
async fn create_tree(service: &EndpointService) -> (Uuid, Uuid, Uuid) {
    let org_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();
    let schema_id = Uuid::new_v4();

    service
        .create_organization_endpoint(org_id, "google")
        .await
        .expect("org endpoint");
    service
        .create_project_endpoint(project_id, org_id, "admin-backend")
        .await
        .expect("project endpoint");
    service
        .create_schema_endpoint(schema_id, project_id, "users")
        .await
        .expect("schema endpoint");

    (org_id, project_id, schema_id)
}

// =========================================================================
// Creation & Resolution
// =========================================================================

#[tokio::test]
async fn test_create_then_resolve_returns_creation_ids() {
    let (service, _temp_dir) = create_test_service().await;
    let (org_id, project_id, schema_id) = create_tree(&service).await;

    assert_eq!(
        service.resolve_organization("google").await.unwrap(),
        org_id
    );
    assert_eq!(
        service
            .resolve_project("google", "admin-backend")
            .await
            .unwrap(),
        project_id
    );
    assert_eq!(
        service
            .resolve_schema("google", "admin-backend", "users")
            .await
            .unwrap(),
        schema_id
    );
}

#[tokio::test]
async fn test_created_paths_are_materialized() {
    let (service, _temp_dir) = create_test_service().await;
    create_tree(&service).await;

    let subtree = service.list_subtree("google").await.unwrap();
    let paths: Vec<_> = subtree.iter().map(|e| e.full_path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["google", "google/admin-backend", "google/admin-backend/users"]
    );
}

#[tokio::test]
async fn test_resolve_missing_path_fails_not_found() {
    let (service, _temp_dir) = create_test_service().await;
    create_tree(&service).await;

    let err = service.resolve_organization("amazon").await.unwrap_err();
    assert!(matches!(err, EndpointServiceError::PathNotFound { .. }));

    let err = service
        .resolve_schema("google", "admin-backend", "orders")
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::PathNotFound { .. }));
}

#[tokio::test]
async fn test_resolve_wrong_kind_fails_not_found() {
    let (service, _temp_dir) = create_test_service().await;
    create_tree(&service).await;

    // A raw path pointing at a project is not an organization
    let err = service
        .resolve_organization("google/admin-backend")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EndpointServiceError::PathNotFound {
            expected: EndpointKind::Organization,
            ..
        }
    ));

    // Project resolution against a schema path
    let err = service
        .resolve_project("google/admin-backend", "users")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EndpointServiceError::PathNotFound {
            expected: EndpointKind::Project,
            ..
        }
    ));
}

// =========================================================================
// Duplicates & Validation
// =========================================================================

#[tokio::test]
async fn test_duplicate_create_fails_and_keeps_first() {
    let (service, _temp_dir) = create_test_service().await;

    let first_id = Uuid::new_v4();
    service
        .create_organization_endpoint(first_id, "google")
        .await
        .unwrap();

    let err = service
        .create_organization_endpoint(Uuid::new_v4(), "google")
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::DuplicatePath { .. }));

    // Only the first creation is visible
    assert_eq!(
        service.resolve_organization("google").await.unwrap(),
        first_id
    );
    assert_eq!(
        service
            .list_by_kind(EndpointKind::Organization)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_same_slug_under_different_parents_is_allowed() {
    let (service, _temp_dir) = create_test_service().await;

    let google = Uuid::new_v4();
    let amazon = Uuid::new_v4();
    service
        .create_organization_endpoint(google, "google")
        .await
        .unwrap();
    service
        .create_organization_endpoint(amazon, "amazon")
        .await
        .unwrap();

    // Sibling slugs only need to be unique per parent; "api" under both orgs
    // produces distinct full paths.
    let p1 = Uuid::new_v4();
    let p2 = Uuid::new_v4();
    service
        .create_project_endpoint(p1, google, "api")
        .await
        .unwrap();
    service
        .create_project_endpoint(p2, amazon, "api")
        .await
        .unwrap();

    assert_eq!(service.resolve_project("google", "api").await.unwrap(), p1);
    assert_eq!(service.resolve_project("amazon", "api").await.unwrap(), p2);

    // But the same slug under the same parent collides
    let err = service
        .create_project_endpoint(Uuid::new_v4(), google, "api")
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::DuplicatePath { .. }));
}

#[tokio::test]
async fn test_invalid_slug_rejected_at_construction() {
    let (service, _temp_dir) = create_test_service().await;

    for bad in ["", "Has Caps", "with/slash", "-leading"] {
        let err = service
            .create_organization_endpoint(Uuid::new_v4(), bad)
            .await
            .unwrap_err();
        assert!(
            matches!(err, EndpointServiceError::ValidationFailed(_)),
            "slug {:?} should fail validation, got {:?}",
            bad,
            err
        );
    }

    // Nothing was persisted
    assert!(service
        .list_by_kind(EndpointKind::Organization)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_create_project_without_parent_endpoint_fails() {
    let (service, _temp_dir) = create_test_service().await;

    let err = service
        .create_project_endpoint(Uuid::new_v4(), Uuid::new_v4(), "api")
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::ParentNotFound { .. }));
}

// =========================================================================
// Deletion
// =========================================================================

#[tokio::test]
async fn test_delete_schema_endpoint() {
    let (service, _temp_dir) = create_test_service().await;
    let (_, project_id, schema_id) = create_tree(&service).await;

    let result = service
        .delete_endpoint(schema_id, EndpointKind::Schema)
        .await
        .unwrap();
    assert!(result.existed);

    let err = service
        .resolve_schema("google", "admin-backend", "users")
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::PathNotFound { .. }));

    // The parent project is untouched
    assert_eq!(
        service
            .resolve_project("google", "admin-backend")
            .await
            .unwrap(),
        project_id
    );
}

#[tokio::test]
async fn test_delete_organization_cascades_to_subtree() {
    let (service, _temp_dir) = create_test_service().await;
    let (org_id, _, _) = create_tree(&service).await;

    service
        .delete_endpoint(org_id, EndpointKind::Organization)
        .await
        .unwrap();

    // No orphaned path rows survive the parent delete
    assert!(service.list_subtree("google").await.unwrap().is_empty());
    assert!(service
        .resolve_project("google", "admin-backend")
        .await
        .is_err());
    assert!(service
        .resolve_schema("google", "admin-backend", "users")
        .await
        .is_err());
}

#[tokio::test]
async fn test_delete_unknown_resource_fails_not_found() {
    let (service, _temp_dir) = create_test_service().await;

    let err = service
        .delete_endpoint(Uuid::new_v4(), EndpointKind::Organization)
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::EndpointNotFound { .. }));
}

// =========================================================================
// Lookups
// =========================================================================

#[tokio::test]
async fn test_find_by_resource_round_trip() {
    let (service, _temp_dir) = create_test_service().await;
    let (org_id, project_id, schema_id) = create_tree(&service).await;

    let endpoint = service
        .find_by_resource(project_id, EndpointKind::Project)
        .await
        .unwrap();
    assert_eq!(endpoint.full_path, "google/admin-backend");
    assert_eq!(endpoint.resource_id(), project_id);

    let endpoint = service
        .find_by_resource(schema_id, EndpointKind::Schema)
        .await
        .unwrap();
    assert_eq!(endpoint.full_path, "google/admin-backend/users");

    // A project id is not an organization id
    let err = service
        .find_by_resource(project_id, EndpointKind::Organization)
        .await
        .unwrap_err();
    assert!(matches!(err, EndpointServiceError::EndpointNotFound { .. }));

    assert!(service.path_exists("google").await.unwrap());
    assert!(!service.path_exists("google/missing").await.unwrap());

    let orgs = service
        .list_by_kind(EndpointKind::Organization)
        .await
        .unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].resource_id(), org_id);
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test]
async fn test_mutations_emit_events() {
    let (service, _temp_dir) = create_test_service().await;
    let mut events = service.subscribe();

    let org_id = Uuid::new_v4();
    service
        .create_organization_endpoint(org_id, "google")
        .await
        .unwrap();
    service
        .rename_endpoint(org_id, EndpointKind::Organization, "google-inc")
        .await
        .unwrap();
    service
        .delete_endpoint(org_id, EndpointKind::Organization)
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        EndpointEvent::Created { endpoint } => {
            assert_eq!(endpoint.full_path, "google");
        }
        other => panic!("expected created event, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        EndpointEvent::Renamed {
            old_path, new_path, ..
        } => {
            assert_eq!(old_path, "google");
            assert_eq!(new_path, "google-inc");
        }
        other => panic!("expected renamed event, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        EndpointEvent::Deleted { full_path, .. } => {
            assert_eq!(full_path, "google-inc");
        }
        other => panic!("expected deleted event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_mutations_emit_no_events() {
    let (service, _temp_dir) = create_test_service().await;

    service
        .create_organization_endpoint(Uuid::new_v4(), "google")
        .await
        .unwrap();

    let mut events = service.subscribe();
    let _ = service
        .create_organization_endpoint(Uuid::new_v4(), "google")
        .await
        .unwrap_err();

    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
}
