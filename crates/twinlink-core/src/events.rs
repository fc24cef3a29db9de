//! Change notifications emitted by the authoritative model.
//!
//! Events are consumed strictly in arrival order by the mutation handler.
//! Delivery may be at-least-once; every payload is safe to replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ElementValue, ModelElement};
use crate::types::Reference;

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// A change to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(default)]
    pub id: EventId,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub payload: ChangePayload,
}

impl ChangeEvent {
    pub fn new(payload: ChangePayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn created(reference: Reference, value: ModelElement) -> Self {
        Self::new(ChangePayload::ElementCreated {
            reference,
            value: Some(value),
        })
    }

    pub fn updated(reference: Reference, value: ModelElement) -> Self {
        Self::new(ChangePayload::ElementUpdated {
            reference,
            value: Some(value),
        })
    }

    pub fn deleted(reference: Reference) -> Self {
        Self::new(ChangePayload::ElementDeleted { reference })
    }

    pub fn value_changed(reference: Reference, value: ElementValue) -> Self {
        Self::new(ChangePayload::ValueChanged { reference, value })
    }

    pub fn reference(&self) -> &Reference {
        self.payload.reference()
    }
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum ChangePayload {
    /// An element was added. Without a value the element is fetched from
    /// the model source.
    ElementCreated {
        reference: Reference,
        #[serde(default)]
        value: Option<ModelElement>,
    },
    /// An element changed structurally and must be rebuilt.
    ElementUpdated {
        reference: Reference,
        #[serde(default)]
        value: Option<ModelElement>,
    },
    /// An element and all of its descendants were removed.
    ElementDeleted { reference: Reference },
    /// Only the value of a value-bearing element changed.
    ValueChanged {
        reference: Reference,
        value: ElementValue,
    },
}

impl ChangePayload {
    pub fn reference(&self) -> &Reference {
        match self {
            ChangePayload::ElementCreated { reference, .. }
            | ChangePayload::ElementUpdated { reference, .. }
            | ChangePayload::ElementDeleted { reference }
            | ChangePayload::ValueChanged { reference, .. } => reference,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangePayload::ElementCreated { .. } => "created",
            ChangePayload::ElementUpdated { .. } => "updated",
            ChangePayload::ElementDeleted { .. } => "deleted",
            ChangePayload::ValueChanged { .. } => "value_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Key, KeyType};

    #[test]
    fn test_event_serialization() {
        let reference =
            Reference::submodel("urn:sm:1").child(Key::id_short(KeyType::Property, "P1"));
        let event = ChangeEvent::deleted(reference.clone());

        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.reference(), &reference);
        assert!(json.contains("\"event_type\":\"ElementDeleted\""));
    }

    #[test]
    fn test_event_without_id_or_value() {
        let json = r#"{
            "payload": {
                "event_type": "ElementCreated",
                "reference": { "keys": [ { "type": "Submodel", "value": "urn:sm:2", "idType": "IRI" } ] }
            }
        }"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        match event.payload {
            ChangePayload::ElementCreated { value, .. } => assert!(value.is_none()),
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
