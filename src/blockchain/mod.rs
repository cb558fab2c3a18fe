// Blockchain module
//
// This module contains the core ledger implementation including:
// - Transaction signing and verification
// - Block hashing and proof-of-work mining
// - Chain assembly, validation and balance accounting
// - Cryptography utilities (secp256k1, SHA-256)

pub mod block;
pub mod chain;
pub mod crypto;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, CancelToken};
pub use chain::{Blockchain, BlockchainError};
pub use crypto::{Address, DigitalSignature, Wallet};
pub use transaction::Transaction;
