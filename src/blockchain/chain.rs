use chrono::Utc;
use log::{info, warn};
use thiserror::Error;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use super::block::{Block, CancelToken, MiningError};
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Transaction does not include a sender address")]
    MissingSenderAddress,

    #[error("Transaction does not include a recipient address")]
    MissingRecipientAddress,

    #[error("Transaction signature is invalid")]
    InvalidSignature,

    #[error("Transaction amount must be greater than 0, got {0}")]
    InvalidAmount(f64),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error(
        "Total spend including pending transactions ({pending_total}) exceeds wallet balance ({available})"
    )]
    PendingOverspend { pending_total: f64, available: f64 },

    #[error("Another mining operation is already in progress")]
    MiningInProgress,

    #[error("Mining was cancelled")]
    MiningCancelled,
}

/// Represents the blockchain: the committed chain plus the pending pool
///
/// Cloning yields another handle onto the same shared state. Admission to
/// the pending pool is serialized, at most one mining operation runs at a
/// time (a second concurrent call is rejected), and chain appends are
/// atomic with respect to readers.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first, append-only
    chain: Arc<Mutex<Vec<Block>>>,

    /// Pending transactions to be included in the next block
    pending_transactions: Arc<Mutex<Vec<Transaction>>>,

    /// Mining difficulty (number of leading zero hex digits required)
    difficulty: Arc<AtomicU32>,

    /// Mining reward, minted into each mined block
    mining_reward: Arc<RwLock<f64>>,

    /// Held for the duration of a mining run; try-locked so a concurrent
    /// miner is rejected rather than queued
    mining_guard: Arc<Mutex<()>>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new blockchain containing only the genesis block
    pub fn new() -> Self {
        Self::from_blocks(vec![Block::genesis()])
    }

    /// Rebuilds a blockchain handle around an existing chain
    ///
    /// Used when a serialized chain is loaded back; the result carries the
    /// default difficulty and mining reward and an empty pending pool.
    /// Validity of the supplied blocks is not assumed, call
    /// [`Blockchain::is_chain_valid`] to check it.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Blockchain {
            chain: Arc::new(Mutex::new(blocks)),
            pending_transactions: Arc::new(Mutex::new(Vec::new())),
            difficulty: Arc::new(AtomicU32::new(1)),
            mining_reward: Arc::new(RwLock::new(100.0)),
            mining_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Gets the latest block in the chain
    pub fn get_latest_block(&self) -> Block {
        let chain = self.chain.lock().unwrap();
        chain.last().expect("chain is never empty").clone()
    }

    /// Gets the entire chain
    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.lock().unwrap().clone()
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.pending_transactions.lock().unwrap().clone()
    }

    /// Gets the current mining difficulty
    pub fn difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::Relaxed)
    }

    /// Sets the mining difficulty, effective on the next mining call
    pub fn set_difficulty(&self, difficulty: u32) {
        self.difficulty.store(difficulty, Ordering::Relaxed);
    }

    /// Gets the current mining reward
    pub fn mining_reward(&self) -> f64 {
        *self.mining_reward.read().unwrap()
    }

    /// Sets the mining reward, effective on the next mining call
    pub fn set_mining_reward(&self, reward: f64) {
        *self.mining_reward.write().unwrap() = reward;
    }

    /// Admits a transaction into the pending pool
    ///
    /// A caller-supplied transaction must carry a sender and a recipient,
    /// verify against its signature, move a strictly positive amount, and
    /// be covered by the sender's committed balance even after all of the
    /// sender's already-pending transactions are accounted for. Admission
    /// is all-or-nothing: a rejected transaction leaves no trace.
    pub fn add_transaction(&self, transaction: Transaction) -> Result<(), BlockchainError> {
        let sender = transaction
            .sender
            .as_ref()
            .ok_or(BlockchainError::MissingSenderAddress)?
            .clone();

        if transaction.recipient.0.is_empty() {
            return Err(BlockchainError::MissingRecipientAddress);
        }

        if !transaction.verify()? {
            return Err(BlockchainError::InvalidSignature);
        }

        if transaction.amount <= 0.0 {
            return Err(BlockchainError::InvalidAmount(transaction.amount));
        }

        // The pool lock is held across the balance check and the append so
        // two racing submissions cannot both pass the aggregate check.
        let mut pending = self.pending_transactions.lock().unwrap();

        let balance = self.get_balance_of_address(&sender);
        if balance < transaction.amount {
            return Err(BlockchainError::InsufficientFunds {
                required: transaction.amount,
                available: balance,
            });
        }

        // Aggregate double-spend guard: the committed balance must cover
        // this transaction plus everything the sender already has pending.
        let pending_spent: f64 = pending
            .iter()
            .filter(|tx| tx.sender.as_ref() == Some(&sender))
            .map(|tx| tx.amount)
            .sum();

        let pending_total = pending_spent + transaction.amount;
        if pending_total > balance {
            return Err(BlockchainError::PendingOverspend {
                pending_total,
                available: balance,
            });
        }

        info!(
            "Transaction admitted: {} -> {} ({})",
            sender, transaction.recipient, transaction.amount
        );
        pending.push(transaction);

        Ok(())
    }

    /// Mines the pending pool into a new block
    ///
    /// A reward transaction for `reward_address` is appended to the pool
    /// snapshot, the block is mined on top of the current tip, and on
    /// success it is appended to the chain while the pool is cleared, as
    /// one atomic step. This is the only path minting new currency and
    /// the only path committing pending transactions. On cancellation the
    /// ledger is left untouched.
    pub fn mine_pending_transactions(
        &self,
        reward_address: &Address,
        cancel: &CancelToken,
    ) -> Result<Block, BlockchainError> {
        let _guard = self
            .mining_guard
            .try_lock()
            .map_err(|_| BlockchainError::MiningInProgress)?;

        let reward_tx = Transaction::new_reward(reward_address.clone(), self.mining_reward());

        let mut transactions = self.get_pending_transactions();
        transactions.push(reward_tx);

        let previous_hash = self.get_latest_block().hash;
        let mut block = Block::new(Utc::now(), transactions, previous_hash);

        block.mine(self.difficulty(), cancel).map_err(|e| {
            warn!("Mining aborted: {}", e);
            match e {
                MiningError::Cancelled => BlockchainError::MiningCancelled,
            }
        })?;

        // Lock order is pool then chain, same as admission, so the append
        // and the pool reset are observed together.
        let mut pending = self.pending_transactions.lock().unwrap();
        let mut chain = self.chain.lock().unwrap();

        info!(
            "Block {} committed with {} transactions",
            block.hash,
            block.transactions.len()
        );

        chain.push(block.clone());
        pending.clear();

        Ok(block)
    }

    /// Gets the balance of an address by replaying the committed chain
    ///
    /// Sums -amount for every transaction sent by the address and +amount
    /// for every transaction received. Pending transactions do not count;
    /// the replay over committed history is the ground truth.
    pub fn get_balance_of_address(&self, address: &Address) -> f64 {
        let chain = self.chain.lock().unwrap();
        let mut balance = 0.0;

        for block in chain.iter() {
            for transaction in &block.transactions {
                if transaction.sender.as_ref() == Some(address) {
                    balance -= transaction.amount;
                }
                if transaction.recipient == *address {
                    balance += transaction.amount;
                }
            }
        }

        balance
    }

    /// Lists every committed transaction touching an address, in chain order
    pub fn get_all_transactions_for_wallet(&self, address: &Address) -> Vec<Transaction> {
        let chain = self.chain.lock().unwrap();

        chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| {
                tx.sender.as_ref() == Some(address) || tx.recipient == *address
            })
            .cloned()
            .collect()
    }

    /// Validates the entire chain
    ///
    /// The first block must equal the canonical genesis block exactly, and
    /// every later block must carry only valid transactions, a hash that
    /// matches its recomputation, and a previous-hash linking it to its
    /// predecessor. Every block is examined; the check never stops early
    /// on success.
    pub fn is_chain_valid(&self) -> bool {
        let chain = self.chain.lock().unwrap();

        if chain.first() != Some(&Block::genesis()) {
            warn!("Genesis block has been tampered with");
            return false;
        }

        for window in chain.windows(2) {
            let previous_block = &window[0];
            let current_block = &window[1];

            if !current_block.has_valid_transactions() {
                warn!("Block {} contains invalid transactions", current_block.hash);
                return false;
            }

            if current_block.hash != current_block.calculate_hash() {
                warn!("Block {} does not match its recomputed hash", current_block.hash);
                return false;
            }

            if current_block.previous_hash != previous_block.hash {
                warn!("Block {} is not linked to its predecessor", current_block.hash);
                return false;
            }
        }

        true
    }
}
