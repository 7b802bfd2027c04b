//! The chain manager: sealed blocks, the pending pool and the VIN index.
//!
//! All three live behind one `RwLock`. Writers (`submit`, `seal_block`,
//! `rebuild_index`) hold the write lock for their whole operation, so a
//! reader never sees a block on the chain without its index entries, or
//! the reverse. Readers return owned snapshots.

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::blockchain::Block;
use crate::error::{IntegrityViolation, LedgerError};
use crate::hash::Digest;
use crate::index::VinIndex;
use crate::tx::Transaction;
use crate::vehicle::{self, VehicleState};

/// `previous_identity` of the genesis block.
pub const GENESIS_PREVIOUS_IDENTITY: Digest = Digest::ZERO;

#[derive(Debug)]
struct ChainState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    index: VinIndex,
}

impl ChainState {
    fn seal(&mut self, nonce: u64) -> Block {
        let previous_identity = self
            .chain
            .last()
            .map_or(GENESIS_PREVIOUS_IDENTITY, Block::identity);
        let sequence_number = self.chain.len() as u64 + 1;
        let transactions = std::mem::take(&mut self.pending);
        let block = Block::seal(sequence_number, transactions, previous_identity, nonce);

        self.index.index_block(self.chain.len(), &block);
        self.chain.push(block.clone());
        block
    }
}

#[derive(Debug)]
pub struct Ledger {
    state: RwLock<ChainState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// A fresh ledger holding only the genesis block.
    pub fn new() -> Self {
        let mut state = ChainState {
            chain: Vec::new(),
            pending: Vec::new(),
            index: VinIndex::new(),
        };
        let genesis = state.seal(0);
        debug!(identity = %genesis.identity(), "sealed genesis block");
        Self {
            state: RwLock::new(state),
        }
    }

    /// Load a previously exported chain. Stored identities are taken as-is;
    /// run [`Ledger::validate_chain`] before trusting the result.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, LedgerError> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        let index = VinIndex::from_chain(&blocks);
        info!(
            blocks = blocks.len(),
            vehicles = index.len(),
            "loaded chain"
        );
        Ok(Self {
            state: RwLock::new(ChainState {
                chain: blocks,
                pending: Vec::new(),
                index,
            }),
        })
    }

    /// Queue a transaction for the next block. Returns the sequence number
    /// that block will get.
    pub fn submit(&self, transaction: Transaction) -> u64 {
        let mut state = self.state.write();
        debug!(
            vehicle_id = transaction.vehicle_id(),
            event_type = %transaction.event_type(),
            "transaction submitted"
        );
        state.pending.push(transaction);
        state.chain.len() as u64 + 1
    }

    /// Run `check` and queue the transaction only if it passes, all under the
    /// write lock. The check sees sealed and pending transactions, so two
    /// checked submits before one seal cannot both pass on stale state.
    pub fn submit_checked<E>(
        &self,
        transaction: Transaction,
        check: impl FnOnce(&PoolView<'_>, &Transaction) -> Result<(), E>,
    ) -> Result<u64, E> {
        let mut state = self.state.write();
        check(&PoolView { state: &*state }, &transaction)?;
        debug!(
            vehicle_id = transaction.vehicle_id(),
            event_type = %transaction.event_type(),
            "checked transaction submitted"
        );
        state.pending.push(transaction);
        Ok(state.chain.len() as u64 + 1)
    }

    /// Seal every pending transaction into a new block, link it to the last
    /// block, index it and append it.
    pub fn seal_block(&self, nonce: u64) -> Block {
        let mut state = self.state.write();
        let block = state.seal(nonce);
        info!(
            sequence_number = block.sequence_number(),
            transactions = block.transactions().len(),
            identity = %block.identity(),
            "sealed block"
        );
        block
    }

    /// Walk the chain and report the first integrity violation, if any.
    pub fn verify_chain(&self) -> Result<(), IntegrityViolation> {
        let state = self.state.read();
        let first = check_links(&state.chain).next();
        match first {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every integrity violation in the chain, in chain order.
    pub fn audit_chain(&self) -> Vec<IntegrityViolation> {
        let state = self.state.read();
        check_links(&state.chain).collect()
    }

    /// `true` when every block's identity recomputes to its stored value and
    /// every block links to its predecessor.
    pub fn validate_chain(&self) -> bool {
        match self.verify_chain() {
            Ok(()) => true,
            Err(violation) => {
                warn!(
                    block = violation.block_index(),
                    %violation,
                    "chain validation failed"
                );
                false
            }
        }
    }

    /// Drop the index and rebuild it from the chain. Returns the number of
    /// distinct vehicles indexed.
    pub fn rebuild_index(&self) -> usize {
        let mut state = self.state.write();
        let state = &mut *state;
        state.index.clear();
        for (i, block) in state.chain.iter().enumerate() {
            state.index.index_block(i, block);
        }
        info!(vehicles = state.index.len(), "rebuilt vin index");
        state.index.len()
    }

    /// Every sealed transaction for a vehicle, oldest first.
    pub fn history(&self, vehicle_id: &str) -> Vec<Transaction> {
        let state = self.state.read();
        state.index.history(&state.chain, vehicle_id)
    }

    pub fn exists(&self, vehicle_id: &str) -> bool {
        self.state.read().index.contains(vehicle_id)
    }

    pub fn current_state(&self, vehicle_id: &str) -> Option<VehicleState> {
        vehicle::reconstruct(vehicle_id, &self.history(vehicle_id))
    }

    pub fn latest_mileage(&self, vehicle_id: &str) -> Option<u64> {
        vehicle::latest_mileage(&self.history(vehicle_id))
    }

    pub fn last_block(&self) -> Block {
        let state = self.state.read();
        state
            .chain
            .last()
            .cloned()
            .expect("chain always holds genesis")
    }

    /// The whole chain in exported order.
    pub fn blocks(&self) -> Vec<Block> {
        self.state.read().chain.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().chain.len()
    }

    /// Always `false`: genesis is sealed at construction and `from_blocks`
    /// refuses an empty chain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Vehicle identifiers currently indexed.
    pub fn vehicles(&self) -> Vec<String> {
        let state = self.state.read();
        let mut vins: Vec<String> = state.index.vehicles().map(str::to_string).collect();
        vins.sort_unstable();
        vins
    }
}

/// Sealed and pending transactions as seen from inside
/// [`Ledger::submit_checked`].
pub struct PoolView<'a> {
    state: &'a ChainState,
}

impl PoolView<'_> {
    /// Sealed history followed by pending transactions, oldest first.
    pub fn history(&self, vehicle_id: &str) -> Vec<Transaction> {
        let mut history = self.state.index.history(&self.state.chain, vehicle_id);
        history.extend(
            self.state
                .pending
                .iter()
                .filter(|tx| tx.vehicle_id() == vehicle_id)
                .cloned(),
        );
        history.sort_by_key(Transaction::creation_time);
        history
    }

    pub fn exists(&self, vehicle_id: &str) -> bool {
        self.state.index.contains(vehicle_id)
            || self
                .state
                .pending
                .iter()
                .any(|tx| tx.vehicle_id() == vehicle_id)
    }

    pub fn latest_mileage(&self, vehicle_id: &str) -> Option<u64> {
        vehicle::latest_mileage(&self.history(vehicle_id))
    }
}

/// Check each adjacent pair `(i - 1, i)` for a stored identity that does not
/// recompute, then for a broken link. Genesis is the root and is not checked.
fn check_links(chain: &[Block]) -> impl Iterator<Item = IntegrityViolation> + '_ {
    chain.windows(2).enumerate().flat_map(|(i, pair)| {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = i + 1;
        let recomputed = current.recompute_identity();
        let mismatch = (recomputed != current.identity()).then(|| {
            IntegrityViolation::IdentityMismatch {
                index,
                stored: current.identity(),
                recomputed,
            }
        });
        let broken = (current.previous_identity() != previous.identity()).then(|| {
            IntegrityViolation::BrokenLink {
                index,
                expected: previous.identity(),
                found: current.previous_identity(),
            }
        });
        mismatch.into_iter().chain(broken)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::VehicleEvent;

    fn mileage(vin: &str, miles: u64) -> Transaction {
        Transaction::new(vin, "mechanic_1", "MECHANIC", VehicleEvent::mileage(miles)).unwrap()
    }

    #[test]
    fn genesis_block() {
        let ledger = Ledger::new();
        assert_eq!(ledger.len(), 1);
        let genesis = ledger.last_block();
        assert_eq!(genesis.sequence_number(), 1);
        assert_eq!(genesis.previous_identity(), GENESIS_PREVIOUS_IDENTITY);
        assert!(genesis.transactions().is_empty());
        assert_eq!(genesis.nonce(), 0);
        assert!(!ledger.is_empty());
        assert!(ledger.validate_chain());
    }

    #[test]
    fn submit_reports_next_sequence_number() {
        let ledger = Ledger::new();
        assert_eq!(ledger.submit(mileage("V1", 1)), 2);
        assert_eq!(ledger.submit(mileage("V1", 2)), 2);
        ledger.seal_block(0);
        assert_eq!(ledger.submit(mileage("V1", 3)), 3);
    }

    #[test]
    fn seal_drains_pool_in_order() {
        let ledger = Ledger::new();
        let txs: Vec<Transaction> = (0..5).map(|i| mileage("V1", i)).collect();
        for tx in &txs {
            ledger.submit(tx.clone());
        }
        let last = ledger.last_block().identity();
        let block = ledger.seal_block(1);

        assert_eq!(block.transactions(), txs.as_slice());
        assert_eq!(block.previous_identity(), last);
        assert_eq!(block.sequence_number(), 2);
        assert_eq!(ledger.pending_len(), 0);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn empty_pool_seals_empty_block() {
        let ledger = Ledger::new();
        let block = ledger.seal_block(7);
        assert!(block.transactions().is_empty());
        assert_eq!(block.nonce(), 7);
        assert!(ledger.validate_chain());
    }

    #[test]
    fn tampered_transaction_fails_validation() {
        let ledger = Ledger::new();
        ledger.submit(mileage("V1", 10));
        ledger.seal_block(1);
        assert!(ledger.validate_chain());

        ledger.state.write().chain[1].transactions[0].vehicle_id = "HACKED-VIN".into();

        assert!(!ledger.validate_chain());
        assert!(matches!(
            ledger.verify_chain(),
            Err(IntegrityViolation::IdentityMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn broken_link_fails_even_when_block_is_self_consistent() {
        let ledger = Ledger::new();
        ledger.submit(mileage("V1", 10));
        ledger.seal_block(0);
        ledger.submit(mileage("V1", 20));
        ledger.seal_block(0);

        {
            let mut state = ledger.state.write();
            let b = &state.chain[2];
            let relinked = Block::seal_at(
                b.sequence_number,
                b.transactions.clone(),
                Digest::of("elsewhere"),
                b.nonce,
                b.creation_time,
            );
            state.chain[2] = relinked;
        }

        assert_eq!(
            ledger.verify_chain().unwrap_err().block_index(),
            2,
            "first offending block is reported"
        );
        assert!(matches!(
            ledger.verify_chain(),
            Err(IntegrityViolation::BrokenLink { index: 2, .. })
        ));
    }

    #[test]
    fn audit_reports_every_violation() {
        let ledger = Ledger::new();
        for miles in [10, 20, 30] {
            ledger.submit(mileage("V1", miles));
            ledger.seal_block(0);
        }
        {
            let mut state = ledger.state.write();
            state.chain[1].nonce = 99;
            state.chain[3].previous_identity = Digest::ZERO;
        }
        let violations = ledger.audit_chain();
        let indices: Vec<usize> = violations.iter().map(|v| v.block_index()).collect();
        // block 2 still links to block 1's stored identity
        assert_eq!(indices, [1, 3, 3]);
        assert_eq!(ledger.verify_chain().unwrap_err(), violations[0]);
    }

    #[test]
    fn index_tracks_sealed_blocks_only() {
        let ledger = Ledger::new();
        ledger.submit(mileage("V1", 10));
        assert!(!ledger.exists("V1"));
        assert!(ledger.history("V1").is_empty());

        ledger.seal_block(0);
        assert!(ledger.exists("V1"));
        assert_eq!(ledger.history("V1").len(), 1);
    }

    #[test]
    fn rebuild_matches_incremental_index() {
        let ledger = Ledger::new();
        for (vin, miles) in [("V1", 1), ("V2", 2), ("V1", 3), ("V3", 4)] {
            ledger.submit(mileage(vin, miles));
            if miles % 2 == 0 {
                ledger.seal_block(0);
            }
        }
        ledger.seal_block(0);

        let incremental = ledger.state.read().index.clone();
        let before: Vec<_> = ledger.vehicles().iter().map(|v| ledger.history(v)).collect();

        assert_eq!(ledger.rebuild_index(), 3);
        assert_eq!(ledger.rebuild_index(), 3);
        assert_eq!(ledger.state.read().index, incremental);
        let after: Vec<_> = ledger.vehicles().iter().map(|v| ledger.history(v)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn from_blocks_rejects_empty_chain() {
        assert_eq!(Ledger::from_blocks(vec![]).unwrap_err(), LedgerError::EmptyChain);
    }

    #[test]
    fn from_blocks_rebuilds_index() {
        let ledger = Ledger::new();
        ledger.submit(mileage("V1", 10));
        ledger.seal_block(0);

        let restored = Ledger::from_blocks(ledger.blocks()).unwrap();
        assert!(restored.validate_chain());
        assert_eq!(restored.history("V1"), ledger.history("V1"));
        assert_eq!(restored.latest_mileage("V1"), Some(10));
    }

    #[test]
    fn checked_submit_sees_pending_transactions() {
        fn no_rollback(pool: &PoolView<'_>, tx: &Transaction) -> Result<(), u64> {
            match (tx.event(), pool.latest_mileage(tx.vehicle_id())) {
                (VehicleEvent::MileageUpdate(m), Some(latest)) if m.new_mileage < Some(latest) => {
                    Err(latest)
                }
                _ => Ok(()),
            }
        }

        let ledger = Ledger::new();
        assert_eq!(ledger.submit_checked(mileage("V1", 1000), no_rollback), Ok(2));
        assert!(!ledger.exists("V1"));
        assert_eq!(ledger.submit_checked(mileage("V1", 200), no_rollback), Err(1000));
        assert_eq!(ledger.pending_len(), 1);

        ledger.seal_block(0);
        assert_eq!(ledger.latest_mileage("V1"), Some(1000));
    }

    #[test]
    fn index_and_chain_move_together_under_concurrent_sealing() {
        let ledger = Ledger::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..200u64 {
                    ledger.submit(mileage("V1", i));
                    ledger.seal_block(0);
                }
            });
            s.spawn(|| {
                for _ in 0..500 {
                    let state = ledger.state.read();
                    let indexed = state.index.locations("V1").len();
                    let on_chain = state
                        .chain
                        .iter()
                        .flat_map(Block::transactions)
                        .filter(|tx| tx.vehicle_id() == "V1")
                        .count();
                    assert_eq!(indexed, on_chain);
                    assert_eq!(state.index.history(&state.chain, "V1").len(), on_chain);
                }
            });
        });

        assert_eq!(ledger.history("V1").len(), 200);
    }
}
