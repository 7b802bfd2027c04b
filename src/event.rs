//! Vehicle lifecycle events and their payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransactionError;

/// The fixed set of event kinds a passport transaction can carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    #[serde(rename = "VEHICLE_CREATED", alias = "CREATED")]
    VehicleCreated,
    #[serde(rename = "MILEAGE_UPDATE")]
    MileageUpdate,
    #[serde(rename = "SERVICE_RECORD")]
    ServiceRecord,
    #[serde(rename = "ACCIDENT_RECORD")]
    AccidentRecord,
    #[serde(rename = "OWNERSHIP_TRANSFER")]
    OwnershipTransfer,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::VehicleCreated,
        EventType::MileageUpdate,
        EventType::ServiceRecord,
        EventType::AccidentRecord,
        EventType::OwnershipTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::VehicleCreated => "VEHICLE_CREATED",
            EventType::MileageUpdate => "MILEAGE_UPDATE",
            EventType::ServiceRecord => "SERVICE_RECORD",
            EventType::AccidentRecord => "ACCIDENT_RECORD",
            EventType::OwnershipTransfer => "OWNERSHIP_TRANSFER",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VEHICLE_CREATED" | "CREATED" => Ok(EventType::VehicleCreated),
            "MILEAGE_UPDATE" => Ok(EventType::MileageUpdate),
            "SERVICE_RECORD" => Ok(EventType::ServiceRecord),
            "ACCIDENT_RECORD" => Ok(EventType::AccidentRecord),
            "OWNERSHIP_TRANSFER" => Ok(EventType::OwnershipTransfer),
            other => Err(TransactionError::InvalidInput(format!(
                "unrecognized event type {other:?}"
            ))),
        }
    }
}

/// Payload of a `VEHICLE_CREATED` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Registration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_mileage: Option<u64>,
    /// First owner. Falls back to the registering actor when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `MILEAGE_UPDATE` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MileageReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_mileage: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a `SERVICE_RECORD` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ServiceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of an `ACCIDENT_RECORD` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AccidentReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of an `OWNERSHIP_TRANSFER` event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct OwnershipTransfer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A lifecycle event: the event type tag together with the fields that
/// type defines. Keys outside the known set ride along in each payload's
/// `extra` map.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleEvent {
    Created(Registration),
    MileageUpdate(MileageReading),
    ServiceRecord(ServiceRecord),
    AccidentRecord(AccidentReport),
    OwnershipTransfer(OwnershipTransfer),
}

impl VehicleEvent {
    pub fn created(make: &str, model: &str, year: u32, initial_mileage: u64) -> Self {
        VehicleEvent::Created(Registration {
            make: Some(make.to_string()),
            model: Some(model.to_string()),
            year: Some(year),
            initial_mileage: Some(initial_mileage),
            ..Default::default()
        })
    }

    pub fn mileage(new_mileage: u64) -> Self {
        VehicleEvent::MileageUpdate(MileageReading {
            new_mileage: Some(new_mileage),
            ..Default::default()
        })
    }

    pub fn service(service_type: &str) -> Self {
        VehicleEvent::ServiceRecord(ServiceRecord {
            service_type: Some(service_type.to_string()),
            ..Default::default()
        })
    }

    pub fn accident(description: &str) -> Self {
        VehicleEvent::AccidentRecord(AccidentReport {
            description: Some(description.to_string()),
            ..Default::default()
        })
    }

    pub fn transfer(new_owner_id: &str) -> Self {
        VehicleEvent::OwnershipTransfer(OwnershipTransfer {
            new_owner_id: Some(new_owner_id.to_string()),
            ..Default::default()
        })
    }

    pub fn event_type(&self) -> EventType {
        match self {
            VehicleEvent::Created(_) => EventType::VehicleCreated,
            VehicleEvent::MileageUpdate(_) => EventType::MileageUpdate,
            VehicleEvent::ServiceRecord(_) => EventType::ServiceRecord,
            VehicleEvent::AccidentRecord(_) => EventType::AccidentRecord,
            VehicleEvent::OwnershipTransfer(_) => EventType::OwnershipTransfer,
        }
    }

    /// The payload as an open JSON object.
    pub fn payload(&self) -> Value {
        let value = match self {
            VehicleEvent::Created(p) => serde_json::to_value(p),
            VehicleEvent::MileageUpdate(p) => serde_json::to_value(p),
            VehicleEvent::ServiceRecord(p) => serde_json::to_value(p),
            VehicleEvent::AccidentRecord(p) => serde_json::to_value(p),
            VehicleEvent::OwnershipTransfer(p) => serde_json::to_value(p),
        };
        value.expect("payload json")
    }

    /// Parse an open payload object under the given event type.
    pub fn from_payload(event_type: EventType, payload: Value) -> Result<Self, TransactionError> {
        let payload = match payload {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let event = match event_type {
            EventType::VehicleCreated => serde_json::from_value(payload).map(VehicleEvent::Created),
            EventType::MileageUpdate => {
                serde_json::from_value(payload).map(VehicleEvent::MileageUpdate)
            }
            EventType::ServiceRecord => {
                serde_json::from_value(payload).map(VehicleEvent::ServiceRecord)
            }
            EventType::AccidentRecord => {
                serde_json::from_value(payload).map(VehicleEvent::AccidentRecord)
            }
            EventType::OwnershipTransfer => {
                serde_json::from_value(payload).map(VehicleEvent::OwnershipTransfer)
            }
        };
        event.map_err(|e| {
            TransactionError::InvalidInput(format!("malformed {event_type} payload: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_alias_is_accepted() {
        let t: EventType = serde_json::from_str("\"CREATED\"").unwrap();
        assert_eq!(t, EventType::VehicleCreated);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"VEHICLE_CREATED\"");
        assert_eq!("CREATED".parse::<EventType>().unwrap(), t);
    }

    #[test]
    fn unknown_event_type_is_invalid_input() {
        assert!(matches!(
            "TEST".parse::<EventType>(),
            Err(TransactionError::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_payload_keys_survive() {
        let payload = json!({"new_mileage": 500, "odometer_photo": "abc.jpg"});
        let event = VehicleEvent::from_payload(EventType::MileageUpdate, payload.clone()).unwrap();
        match &event {
            VehicleEvent::MileageUpdate(m) => {
                assert_eq!(m.new_mileage, Some(500));
                assert_eq!(m.extra["odometer_photo"], "abc.jpg");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(event.payload(), payload);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let err = VehicleEvent::from_payload(
            EventType::MileageUpdate,
            json!({"new_mileage": "five hundred"}),
        )
        .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidInput(_)));
    }

    #[test]
    fn null_payload_is_empty_object() {
        let event = VehicleEvent::from_payload(EventType::AccidentRecord, Value::Null).unwrap();
        assert_eq!(event.payload(), json!({}));
    }
}
