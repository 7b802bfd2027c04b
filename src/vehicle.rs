//! Derived vehicle state, folded from a vehicle's ordered history.

use serde::{Deserialize, Serialize};

use crate::event::VehicleEvent;
use crate::tx::Transaction;

/// Current state of a vehicle as recorded on the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VehicleState {
    pub vehicle_id: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u32>,
    pub current_owner: Option<String>,
    pub latest_mileage: Option<u64>,
    pub created_by: Option<String>,
    pub created_at: Option<i64>,
    pub total_transactions: usize,
}

impl VehicleState {
    fn empty(vehicle_id: &str, total_transactions: usize) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            make: None,
            model: None,
            year: None,
            current_owner: None,
            latest_mileage: None,
            created_by: None,
            created_at: None,
            total_transactions,
        }
    }

    fn apply(&mut self, tx: &Transaction) {
        match tx.event() {
            VehicleEvent::Created(reg) => {
                self.make = reg.make.clone();
                self.model = reg.model.clone();
                self.year = reg.year;
                self.latest_mileage = reg.initial_mileage;
                self.current_owner = Some(
                    reg.owner_id
                        .clone()
                        .unwrap_or_else(|| tx.actor_id().to_string()),
                );
                self.created_by = Some(tx.actor_id().to_string());
                self.created_at = Some(tx.creation_time());
            }
            VehicleEvent::MileageUpdate(reading) => {
                self.latest_mileage = reading.new_mileage;
            }
            VehicleEvent::OwnershipTransfer(transfer) => {
                self.current_owner = transfer.new_owner_id.clone();
            }
            VehicleEvent::ServiceRecord(_) | VehicleEvent::AccidentRecord(_) => {}
        }
    }
}

/// Fold a history (oldest first) into the vehicle's current state.
/// `None` for an empty history.
///
/// Mileage updates and transfers overwrite unconditionally, rollbacks
/// included: a payload without `new_mileage` or `new_owner_id` clears the
/// field. Refusing such events is up to whoever admits transactions.
pub fn reconstruct(vehicle_id: &str, history: &[Transaction]) -> Option<VehicleState> {
    if history.is_empty() {
        return None;
    }
    let mut state = VehicleState::empty(vehicle_id, history.len());
    for tx in history {
        state.apply(tx);
    }
    Some(state)
}

/// Last recorded odometer value in a history (oldest first): the most
/// recent `initial_mileage` or `new_mileage` seen.
pub fn latest_mileage(history: &[Transaction]) -> Option<u64> {
    history
        .iter()
        .filter_map(|tx| match tx.event() {
            VehicleEvent::Created(reg) => reg.initial_mileage,
            VehicleEvent::MileageUpdate(reading) => reading.new_mileage,
            _ => None,
        })
        .last()
}
