use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;
use crate::error::TransactionError;
use crate::event::{EventType, VehicleEvent};
use crate::hash::Digest;

/// Represents one signed vehicle passport event.
///
/// The identity is a digest over every field except the signature, computed
/// once at construction. Signing never perturbs it, and deserialization
/// carries the supplied identity as-is.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(into = "TransactionRecord", try_from = "TransactionRecord")]
pub struct Transaction {
    pub(crate) identity: Option<Digest>,
    pub(crate) vehicle_id: String,
    pub(crate) event: VehicleEvent,
    pub(crate) actor_id: String,
    pub(crate) actor_role: String,
    /// Nanoseconds since the Unix epoch.
    pub(crate) creation_time: i64,
    /// Hex-encoded signature over the identity.
    pub(crate) signature: Option<String>,
}

/// The exported mapping form of a [`Transaction`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub identity: Option<Digest>,
    pub vehicle_id: String,
    pub event_type: EventType,
    pub actor_id: String,
    pub actor_role: String,
    pub creation_time: i64,
    #[serde(default)]
    pub payload: Value,
    pub signature: Option<String>,
}

/// The field-set the identity digest is taken over.
#[derive(Serialize)]
struct IdentityFields<'a> {
    vehicle_id: &'a str,
    event_type: EventType,
    actor_id: &'a str,
    actor_role: &'a str,
    creation_time: i64,
    payload: Value,
}

impl Transaction {
    pub fn new(
        vehicle_id: impl Into<String>,
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
        event: VehicleEvent,
    ) -> Result<Self, TransactionError> {
        Self::new_at(vehicle_id, actor_id, actor_role, event, clock::now_nanos())
    }

    /// Like [`Transaction::new`] with an explicit creation time.
    pub fn new_at(
        vehicle_id: impl Into<String>,
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
        event: VehicleEvent,
        creation_time: i64,
    ) -> Result<Self, TransactionError> {
        let vehicle_id = vehicle_id.into();
        if vehicle_id.trim().is_empty() {
            return Err(TransactionError::InvalidInput("vehicle_id is empty".into()));
        }
        let mut tx = Self {
            identity: None,
            vehicle_id,
            event,
            actor_id: actor_id.into(),
            actor_role: actor_role.into(),
            creation_time,
            signature: None,
        };
        tx.identity = Some(tx.compute_identity());
        Ok(tx)
    }

    /// Loosely-typed construction: the event type by name and the payload as
    /// an open JSON object.
    pub fn from_parts(
        vehicle_id: impl Into<String>,
        event_type: &str,
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
        payload: Value,
    ) -> Result<Self, TransactionError> {
        let event_type: EventType = event_type.parse()?;
        let event = VehicleEvent::from_payload(event_type, payload)?;
        Self::new(vehicle_id, actor_id, actor_role, event)
    }

    /// Derive the identity from the current field values. Validation uses
    /// this to compare against the stored identity; it never overwrites it.
    pub fn compute_identity(&self) -> Digest {
        Digest::of(&IdentityFields {
            vehicle_id: &self.vehicle_id,
            event_type: self.event.event_type(),
            actor_id: &self.actor_id,
            actor_role: &self.actor_role,
            creation_time: self.creation_time,
            payload: self.event.payload(),
        })
    }

    pub fn identity(&self) -> Option<Digest> {
        self.identity
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn event(&self) -> &VehicleEvent {
        &self.event
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn actor_role(&self) -> &str {
        &self.actor_role
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The exact bytes a signer signs: the UTF-8 hex rendering of the identity.
    pub fn signing_message(&self) -> Result<Vec<u8>, TransactionError> {
        self.identity
            .map(|id| id.to_hex().into_bytes())
            .ok_or(TransactionError::NotIdentified)
    }

    /// Attach a signature. Allowed exactly once, and only on an identified
    /// transaction.
    pub fn assign_signature(&mut self, signature: &[u8]) -> Result<(), TransactionError> {
        if self.identity.is_none() {
            return Err(TransactionError::NotIdentified);
        }
        if self.signature.is_some() {
            return Err(TransactionError::AlreadySigned);
        }
        self.signature = Some(hex::encode(signature));
        Ok(())
    }

    /// Decoded signature bytes, if signed.
    pub fn signature_bytes(&self) -> Result<Option<Vec<u8>>, TransactionError> {
        self.signature
            .as_deref()
            .map(|s| hex::decode(s).map_err(|_| TransactionError::MalformedSignature))
            .transpose()
    }

    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            identity: self.identity,
            vehicle_id: self.vehicle_id.clone(),
            event_type: self.event.event_type(),
            actor_id: self.actor_id.clone(),
            actor_role: self.actor_role.clone(),
            creation_time: self.creation_time,
            payload: self.event.payload(),
            signature: self.signature.clone(),
        }
    }

    /// Rebuild from the exported form. The supplied identity is trusted, not
    /// recomputed.
    pub fn from_record(record: TransactionRecord) -> Result<Self, TransactionError> {
        let event = VehicleEvent::from_payload(record.event_type, record.payload)?;
        Ok(Self {
            identity: record.identity,
            vehicle_id: record.vehicle_id,
            event,
            actor_id: record.actor_id,
            actor_role: record.actor_role,
            creation_time: record.creation_time,
            signature: record.signature,
        })
    }
}

impl From<Transaction> for TransactionRecord {
    fn from(tx: Transaction) -> Self {
        tx.to_record()
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = TransactionError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        Transaction::from_record(record)
    }
}
