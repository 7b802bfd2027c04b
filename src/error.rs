use thiserror::Error;

use crate::event::EventType;
use crate::hash::Digest;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transaction is already signed")]
    AlreadySigned,
    #[error("transaction has no identity to sign")]
    NotIdentified,
    #[error("signature is not valid hex")]
    MalformedSignature,
}

/// A chain validation failure. `index` is the offending block's position in
/// the chain (0 = genesis).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    #[error("block {index} identity mismatch: stored {stored}, recomputed {recomputed}")]
    IdentityMismatch {
        index: usize,
        stored: Digest,
        recomputed: Digest,
    },
    #[error("block {index} previous_identity {found} does not link to {expected}")]
    BrokenLink {
        index: usize,
        expected: Digest,
        found: Digest,
    },
}

impl IntegrityViolation {
    pub fn block_index(&self) -> usize {
        match self {
            Self::IdentityMismatch { index, .. } | Self::BrokenLink { index, .. } => *index,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("chain has no genesis block")]
    EmptyChain,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    // Provenance
    #[error("user {0} not found")]
    UnknownActor(String),
    #[error("user {actor_id} with role {role} cannot create {event_type} transactions")]
    PermissionDenied {
        actor_id: String,
        role: String,
        event_type: EventType,
    },
    #[error("transaction signature does not verify for {0}")]
    InvalidSignature(String),

    // Business rules
    #[error("vehicle {0} is not registered")]
    UnknownVehicle(String),
    #[error("vehicle {0} is already registered")]
    AlreadyRegistered(String),
    #[error("mileage rollback on {vehicle_id}: {proposed} is below recorded {latest}")]
    MileageRollback {
        vehicle_id: String,
        proposed: u64,
        latest: u64,
    },
}
