//! Append-only, tamper-evident ledger of vehicle lifecycle events.
//!
//! Signed [`Transaction`]s are pooled, sealed into hash-linked [`Block`]s and
//! indexed by vehicle identifier. A vehicle's history folds into its current
//! [`VehicleState`]; [`Ledger::validate_chain`] re-derives every block
//! identity and link instead of trusting what is stored.

pub mod admission;
pub mod blockchain;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod hash;
pub mod index;
pub mod ledger;
pub mod roles;
pub mod tx;
pub mod vehicle;

pub use admission::Admission;
pub use blockchain::Block;
pub use error::{AdmissionError, IntegrityViolation, LedgerError, TransactionError};
pub use event::{EventType, VehicleEvent};
pub use hash::Digest;
pub use ledger::{Ledger, PoolView};
pub use roles::{Permissions, Role, UserRegistry};
pub use tx::Transaction;
pub use vehicle::VehicleState;
