//! Secondary index from vehicle identifier to transaction positions.
//!
//! The index owns no transactions. It records where each vehicle's
//! transactions sit in the chain and resolves them against the chain on
//! demand, so it can always be rebuilt from the chain alone.

use std::collections::HashMap;

use crate::blockchain::Block;
use crate::tx::Transaction;

/// Position of a transaction: block index in the chain, then index within
/// that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TxLocation {
    pub block: usize,
    pub position: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VinIndex {
    by_vehicle: HashMap<String, Vec<TxLocation>>,
}

impl VinIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over a whole chain.
    pub fn from_chain(chain: &[Block]) -> Self {
        let mut index = Self::new();
        for (i, block) in chain.iter().enumerate() {
            index.index_block(i, block);
        }
        index
    }

    /// Record every transaction of the block at chain position `block_index`.
    /// Blocks must be indexed in chain order.
    pub fn index_block(&mut self, block_index: usize, block: &Block) {
        for (position, tx) in block.transactions().iter().enumerate() {
            self.by_vehicle
                .entry(tx.vehicle_id().to_string())
                .or_default()
                .push(TxLocation {
                    block: block_index,
                    position,
                });
        }
    }

    pub fn clear(&mut self) {
        self.by_vehicle.clear();
    }

    /// Number of distinct vehicles indexed.
    pub fn len(&self) -> usize {
        self.by_vehicle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_vehicle.is_empty()
    }

    pub fn contains(&self, vehicle_id: &str) -> bool {
        self.by_vehicle
            .get(vehicle_id)
            .map_or(false, |locations| !locations.is_empty())
    }

    /// Positions for a vehicle in chain order.
    pub fn locations(&self, vehicle_id: &str) -> &[TxLocation] {
        self.by_vehicle
            .get(vehicle_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &str> {
        self.by_vehicle.keys().map(String::as_str)
    }

    /// Resolve a vehicle's transactions against the chain, ordered by
    /// creation time. The sort is stable, so equal times keep chain order.
    ///
    /// The index must have been built from `chain`; a location the chain
    /// does not hold panics rather than being skipped.
    pub fn history(&self, chain: &[Block], vehicle_id: &str) -> Vec<Transaction> {
        let mut history: Vec<Transaction> = self
            .locations(vehicle_id)
            .iter()
            .map(|loc| chain[loc.block].transactions()[loc.position].clone())
            .collect();
        history.sort_by_key(Transaction::creation_time);
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::VehicleEvent;
    use crate::hash::Digest;

    fn tx(vin: &str, at: i64, miles: u64) -> Transaction {
        Transaction::new_at(vin, "mech", "MECHANIC", VehicleEvent::mileage(miles), at).unwrap()
    }

    fn chain() -> Vec<Block> {
        let genesis = Block::seal(1, vec![], Digest::ZERO, 0);
        let b2 = Block::seal(
            2,
            vec![tx("V1", 10, 1), tx("V2", 11, 2), tx("V1", 12, 3)],
            genesis.identity(),
            0,
        );
        let b3 = Block::seal(3, vec![tx("V1", 13, 4)], b2.identity(), 0);
        vec![genesis, b2, b3]
    }

    #[test]
    fn locations_follow_chain_then_block_order() {
        let index = VinIndex::from_chain(&chain());
        assert_eq!(
            index.locations("V1"),
            [
                TxLocation { block: 1, position: 0 },
                TxLocation { block: 1, position: 2 },
                TxLocation { block: 2, position: 0 },
            ]
        );
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn history_sorts_by_time_and_keeps_ties_stable() {
        let genesis = Block::seal(1, vec![], Digest::ZERO, 0);
        let b2 = Block::seal(
            2,
            vec![tx("V1", 50, 1), tx("V1", 20, 2), tx("V1", 20, 3)],
            genesis.identity(),
            0,
        );
        let chain = vec![genesis, b2];
        let index = VinIndex::from_chain(&chain);

        let miles: Vec<Option<u64>> = index
            .history(&chain, "V1")
            .iter()
            .map(|t| match t.event() {
                VehicleEvent::MileageUpdate(m) => m.new_mileage,
                _ => None,
            })
            .collect();
        assert_eq!(miles, [Some(2), Some(3), Some(1)]);
    }

    #[test]
    #[should_panic]
    fn stale_index_is_not_silently_skipped() {
        let chain = chain();
        let index = VinIndex::from_chain(&chain);
        index.history(&chain[..2], "V1");
    }

    #[test]
    fn unknown_vehicle_is_empty() {
        let chain = chain();
        let index = VinIndex::from_chain(&chain);
        assert!(index.history(&chain, "UNKNOWN").is_empty());
        assert!(!index.contains("UNKNOWN"));
        assert!(index.contains("V2"));
    }
}
