use serde::{Deserialize, Serialize};

use crate::clock;
use crate::hash::Digest;
use crate::tx::Transaction;

/// Represents a sealed block in the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Block {
    /// 1-based position in the chain.
    pub(crate) sequence_number: u64,
    /// Nanoseconds since the Unix epoch at sealing.
    pub(crate) creation_time: i64,
    /// Transactions in pool order at sealing time.
    pub(crate) transactions: Vec<Transaction>,
    /// Opaque, caller-supplied. Never searched for.
    pub(crate) nonce: u64,
    /// Identity of the preceding block; all zeros for genesis.
    pub(crate) previous_identity: Digest,
    /// Identity stored at sealing.
    pub(crate) identity: Digest,
}

/// The field-set the block identity is taken over.
#[derive(Serialize)]
struct BlockFields<'a> {
    sequence_number: u64,
    creation_time: i64,
    transactions: &'a [Transaction],
    nonce: u64,
    previous_identity: Digest,
}

impl Block {
    pub fn seal(
        sequence_number: u64,
        transactions: Vec<Transaction>,
        previous_identity: Digest,
        nonce: u64,
    ) -> Self {
        Self::seal_at(
            sequence_number,
            transactions,
            previous_identity,
            nonce,
            clock::now_nanos(),
        )
    }

    pub fn seal_at(
        sequence_number: u64,
        transactions: Vec<Transaction>,
        previous_identity: Digest,
        nonce: u64,
        creation_time: i64,
    ) -> Self {
        let mut block = Self {
            sequence_number,
            creation_time,
            transactions,
            nonce,
            previous_identity,
            identity: Digest::ZERO,
        };
        block.identity = block.recompute_identity();
        block
    }

    /// Digest of the stored fields, with each transaction in its exported
    /// form (stored identity and signature included).
    pub fn recompute_identity(&self) -> Digest {
        Digest::of(&BlockFields {
            sequence_number: self.sequence_number,
            creation_time: self.creation_time,
            transactions: &self.transactions,
            nonce: self.nonce,
            previous_identity: self.previous_identity,
        })
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn creation_time(&self) -> i64 {
        self.creation_time
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_identity(&self) -> Digest {
        self.previous_identity
    }

    pub fn identity(&self) -> Digest {
        self.identity
    }
}
