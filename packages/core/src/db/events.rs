//! Domain Events for the Endpoint Store
//!
//! This module defines the domain events emitted after endpoint mutations
//! commit. They follow the observer pattern, letting other parts of the
//! system (the routing layer's resolution cache in particular) react to path
//! changes without coupling to the database layer.
//!
//! # Architecture
//!
//! Events are emitted using tokio's broadcast channel, allowing multiple
//! subscribers to receive notifications asynchronously. Emission happens
//! after commit only — a rolled-back rename never produces an event.

use crate::models::Endpoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain events emitted by the endpoint service
///
/// These represent committed changes to the path tree, not database
/// operations. `Renamed` carries both paths so caches can evict every entry
/// under the old prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EndpointEvent {
    /// A new endpoint was created
    #[serde(rename = "created")]
    Created { endpoint: Endpoint },

    /// An endpoint was renamed; every descendant under `old_path` now lives
    /// under `new_path`
    #[serde(rename = "renamed")]
    #[serde(rename_all = "camelCase")]
    Renamed {
        id: Uuid,
        old_path: String,
        new_path: String,
    },

    /// An endpoint (and its subtree) was deleted
    #[serde(rename = "deleted")]
    #[serde(rename_all = "camelCase")]
    Deleted { id: Uuid, full_path: String },
}

impl EndpointEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            EndpointEvent::Created { .. } => "endpoint:created",
            EndpointEvent::Renamed { .. } => "endpoint:renamed",
            EndpointEvent::Deleted { .. } => "endpoint:deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: subscribers match on the flat internally-tagged format,
    /// `{"type":"renamed","id":...,"oldPath":...,"newPath":...}`.
    #[test]
    fn test_event_serialization_contract() {
        let id = Uuid::new_v4();
        let event = EndpointEvent::Renamed {
            id,
            old_path: "google".to_string(),
            new_path: "google-inc".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json.get("type").unwrap(), "renamed");
        assert_eq!(json.get("oldPath").unwrap(), "google");
        assert_eq!(json.get("newPath").unwrap(), "google-inc");
        assert!(
            json.get("renamed").is_none(),
            "Should NOT be nested under 'renamed' key"
        );

        let back: EndpointEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_type(), "endpoint:renamed");
    }

    #[test]
    fn test_event_types() {
        let id = Uuid::new_v4();
        let deleted = EndpointEvent::Deleted {
            id,
            full_path: "google".to_string(),
        };
        assert_eq!(deleted.event_type(), "endpoint:deleted");
    }
}
