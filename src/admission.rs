//! Admission control in front of the ledger.
//!
//! Decides whether a transaction may enter the pending pool: the actor must
//! be known, hold the permission for the event type and have signed it, and
//! the event must make sense for the vehicle's recorded state. The ledger
//! itself accepts whatever it is handed.

use tracing::{info, warn};

use crate::blockchain::Block;
use crate::crypto::{sign_transaction, verify_transaction_signature};
use crate::error::AdmissionError;
use crate::event::VehicleEvent;
use crate::ledger::{Ledger, PoolView};
use crate::roles::{Permissions, UserRegistry};
use crate::tx::Transaction;

pub struct Admission<'a> {
    registry: &'a UserRegistry,
    ledger: &'a Ledger,
}

impl<'a> Admission<'a> {
    pub fn new(registry: &'a UserRegistry, ledger: &'a Ledger) -> Self {
        Self { registry, ledger }
    }

    /// Build a transaction on behalf of a registered user and sign it with
    /// their key.
    pub fn create_and_sign(
        &self,
        user_id: &str,
        vehicle_id: &str,
        event: VehicleEvent,
    ) -> Result<Transaction, AdmissionError> {
        let user = self
            .registry
            .get(user_id)
            .ok_or_else(|| AdmissionError::UnknownActor(user_id.to_string()))?;

        let event_type = event.event_type();
        if !self.registry.can_act(user_id, event_type) {
            return Err(AdmissionError::PermissionDenied {
                actor_id: user_id.to_string(),
                role: user.role.to_string(),
                event_type,
            });
        }

        let mut tx = Transaction::new(vehicle_id, user_id, user.role.as_str(), event)?;
        sign_transaction(&mut tx, &user.keypair.signing)?;
        Ok(tx)
    }

    /// Provenance check: known actor, valid signature, permission held.
    pub fn verify(&self, tx: &Transaction) -> bool {
        let Some(user) = self.registry.get(tx.actor_id()) else {
            return false;
        };
        verify_transaction_signature(tx, &user.keypair.verifying)
            && self.registry.can_act(tx.actor_id(), tx.event_type())
    }

    /// Run every admission check and hand the transaction to the pending
    /// pool. Returns the sequence number of the block it will land in.
    ///
    /// Vehicle checks see sealed and pending transactions and run under the
    /// ledger's write lock, so two admits cannot both pass against the same
    /// state.
    pub fn admit(&self, tx: Transaction) -> Result<u64, AdmissionError> {
        if !self.registry.can_act(tx.actor_id(), tx.event_type()) {
            return Err(match self.registry.get(tx.actor_id()) {
                None => AdmissionError::UnknownActor(tx.actor_id().to_string()),
                Some(user) => AdmissionError::PermissionDenied {
                    actor_id: tx.actor_id().to_string(),
                    role: user.role.to_string(),
                    event_type: tx.event_type(),
                },
            });
        }
        if !self.verify(&tx) {
            return Err(AdmissionError::InvalidSignature(tx.actor_id().to_string()));
        }

        self.ledger.submit_checked(tx, check_vehicle)
    }

    /// Create, admit and seal straight away, one block per request.
    pub fn record(
        &self,
        user_id: &str,
        vehicle_id: &str,
        event: VehicleEvent,
    ) -> Result<Block, AdmissionError> {
        let tx = self.create_and_sign(user_id, vehicle_id, event)?;
        self.admit(tx)?;
        let block = self.ledger.seal_block(0);
        info!(
            user_id,
            vehicle_id,
            sequence_number = block.sequence_number(),
            "recorded event"
        );
        Ok(block)
    }
}

fn check_vehicle(pool: &PoolView<'_>, tx: &Transaction) -> Result<(), AdmissionError> {
    let vehicle_id = tx.vehicle_id();
    let registered = pool.exists(vehicle_id);
    match tx.event() {
        VehicleEvent::Created(_) if registered => {
            Err(AdmissionError::AlreadyRegistered(vehicle_id.to_string()))
        }
        VehicleEvent::Created(_) => Ok(()),
        _ if !registered => Err(AdmissionError::UnknownVehicle(vehicle_id.to_string())),
        VehicleEvent::MileageUpdate(reading) => {
            match (reading.new_mileage, pool.latest_mileage(vehicle_id)) {
                (Some(proposed), Some(latest)) if proposed < latest => {
                    warn!(vehicle_id, proposed, latest, "rejected mileage rollback");
                    Err(AdmissionError::MileageRollback {
                        vehicle_id: vehicle_id.to_string(),
                        proposed,
                        latest,
                    })
                }
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}
