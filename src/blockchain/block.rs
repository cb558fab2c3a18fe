use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::transaction::Transaction;

/// Fixed timestamp of the genesis block (2024-05-20T00:00:00Z)
const GENESIS_TIMESTAMP_MILLIS: i64 = 1_716_163_200_000;

/// Errors that can occur while mining a block
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("Mining was cancelled before a valid hash was found")]
    Cancelled,
}

/// Cooperative cancellation signal for mining
///
/// Cloned handles share the same flag; `cancel()` from any holder stops
/// the search at the next nonce increment.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Timestamp when the block was created
    #[schema(value_type = String, example = "2024-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,

    /// Hash of the previous block ("0" for genesis)
    pub previous_hash: String,

    /// Proof-of-work counter
    pub nonce: u64,

    /// Hash of the current block
    pub hash: String,
}

impl Block {
    /// Creates a new block with its hash already computed
    pub fn new(
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Block {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };

        block.hash = block.calculate_hash();
        block
    }

    /// The fixed genesis block: no transactions, no predecessor
    ///
    /// Reproducible byte for byte, so any two ledgers agree on it.
    pub fn genesis() -> Self {
        let timestamp = DateTime::from_timestamp_millis(GENESIS_TIMESTAMP_MILLIS)
            .expect("genesis timestamp is a valid instant");

        Block::new(timestamp, Vec::new(), "0".to_string())
    }

    /// Calculates the SHA-256 hash of the block
    ///
    /// Covers the previous hash, the timestamp, a canonical
    /// order-preserving serialization of the transaction list, and the
    /// nonce, as a hexadecimal digest.
    pub fn calculate_hash(&self) -> String {
        let transactions = serde_json::to_string(&self.transactions)
            .expect("transaction list serializes to JSON");

        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.timestamp.timestamp_millis().to_string().as_bytes());
        hasher.update(transactions.as_bytes());
        hasher.update(self.nonce.to_string().as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Brute-forces a nonce until the hash starts with `difficulty` zeros
    ///
    /// The expected attempt count grows as 16^difficulty; the token is
    /// checked between nonce increments so a long search can be stopped.
    pub fn mine(&mut self, difficulty: u32, cancel: &CancelToken) -> Result<(), MiningError> {
        let target = "0".repeat(difficulty as usize);

        while !self.hash.starts_with(&target) {
            if cancel.is_cancelled() {
                return Err(MiningError::Cancelled);
            }

            self.nonce += 1;
            self.hash = self.calculate_hash();
        }

        info!("Block mined: {}", self.hash);
        Ok(())
    }

    /// Checks the validity of every transaction in this block
    ///
    /// Short-circuits on the first invalid transaction; an empty block
    /// (genesis) trivially passes.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions
            .iter()
            .all(|tx| tx.verify().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    #[test]
    fn test_new_block() {
        let miner = Wallet::new().unwrap();
        let transactions = vec![Transaction::new_reward(miner.address().clone(), 100.0)];

        let block = Block::new(Utc::now(), transactions, "previous_hash".to_string());

        assert_eq!(block.nonce, 0);
        assert_eq!(block.previous_hash, "previous_hash");
        assert_eq!(block.hash, block.calculate_hash());
        assert_eq!(block.hash.len(), 64);
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Block::genesis();
        let b = Block::genesis();

        assert_eq!(a, b);
        assert_eq!(a.previous_hash, "0");
        assert!(a.transactions.is_empty());
        assert!(a.has_valid_transactions());
    }

    #[test]
    fn test_calculate_hash_is_idempotent() {
        let block = Block::new(Utc::now(), Vec::new(), "0".to_string());

        assert_eq!(block.calculate_hash(), block.calculate_hash());
    }

    #[test]
    fn test_hash_changes_with_nonce() {
        let mut block = Block::new(Utc::now(), Vec::new(), "0".to_string());
        let before = block.calculate_hash();

        block.nonce += 1;
        assert_ne!(before, block.calculate_hash());
    }

    #[test]
    fn test_mining_meets_difficulty() {
        for difficulty in 0..=2 {
            let mut block = Block::new(Utc::now(), Vec::new(), "0".to_string());

            block.mine(difficulty, &CancelToken::new()).unwrap();

            let target = "0".repeat(difficulty as usize);
            assert!(block.hash.starts_with(&target));
            assert_eq!(block.hash, block.calculate_hash());
        }
    }

    #[test]
    fn test_mining_honours_cancellation() {
        let mut block = Block::new(Utc::now(), Vec::new(), "0".to_string());

        let cancel = CancelToken::new();
        cancel.cancel();

        // Difficulty high enough that the initial hash cannot satisfy it
        let result = block.mine(16, &cancel);
        assert!(matches!(result, Err(MiningError::Cancelled)));
    }

    #[test]
    fn test_has_valid_transactions() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let mut signed = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            5.0,
        );
        signed.sign(&sender).unwrap();

        let reward = Transaction::new_reward(sender.address().clone(), 100.0);

        let block = Block::new(Utc::now(), vec![signed, reward], "0".to_string());
        assert!(block.has_valid_transactions());
    }

    #[test]
    fn test_unsigned_transaction_invalidates_block() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let unsigned = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            5.0,
        );

        let block = Block::new(Utc::now(), vec![unsigned], "0".to_string());
        assert!(!block.has_valid_transactions());
    }
}
