use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{verify_digest, Address, CryptoError, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Key mismatch: cannot sign transactions for other wallets")]
    KeyMismatch,

    #[error("No signature present on this transaction")]
    MissingSignature,

    #[error("Reward transactions cannot be signed")]
    RewardNotSignable,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Represents a transaction in the blockchain
///
/// A `None` sender marks a system-issued mining reward; every
/// caller-submitted transaction carries a sender and, once signed,
/// is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, absent for mining rewards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Timestamp when the transaction was created
    #[schema(value_type = String, example = "2024-01-01T12:00:00Z")]
    pub timestamp: DateTime<Utc>,

    /// Digital signature over the transaction hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transaction
    pub fn new(sender: Address, recipient: Address, amount: f64) -> Self {
        Transaction {
            sender: Some(sender),
            recipient,
            amount,
            timestamp: Utc::now(),
            signature: None,
        }
    }

    /// Creates a new mining-reward transaction (no sender, no signature)
    pub fn new_reward(recipient: Address, amount: f64) -> Self {
        Transaction {
            sender: None,
            recipient,
            amount,
            timestamp: Utc::now(),
            signature: None,
        }
    }

    /// Calculates the SHA-256 hash of the transaction
    ///
    /// Only the economically meaningful fields (sender, recipient, amount,
    /// timestamp) are hashed, never the signature, so a verifier can
    /// recompute exactly what the signer signed.
    pub fn calculate_hash(&self) -> String {
        hex::encode(self.hash_digest())
    }

    /// The raw 32-byte digest that gets signed
    fn hash_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();

        if let Some(sender) = &self.sender {
            hasher.update(sender.0.as_bytes());
        }
        hasher.update(self.recipient.0.as_bytes());
        hasher.update(self.amount.to_string().as_bytes());
        hasher.update(self.timestamp.timestamp_millis().to_string().as_bytes());

        hasher.finalize().into()
    }

    /// Signs the transaction with a wallet
    ///
    /// The wallet's address must match the sender; rewards carry no sender
    /// and are never signed.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or(TransactionError::RewardNotSignable)?;

        if wallet.address() != sender {
            return Err(TransactionError::KeyMismatch);
        }

        let signature = wallet.sign_digest(&self.hash_digest())?;
        self.signature = Some(signature);

        Ok(())
    }

    /// Verifies the transaction's signature
    ///
    /// Mining rewards are axiomatically valid. An unsigned non-reward
    /// transaction is an error; otherwise the result of ECDSA verification
    /// of the transaction hash against the sender's public key is returned.
    pub fn verify(&self) -> Result<bool, TransactionError> {
        let sender = match &self.sender {
            None => return Ok(true),
            Some(sender) => sender,
        };

        let signature = self
            .signature
            .as_ref()
            .ok_or(TransactionError::MissingSignature)?;

        verify_digest(sender, &self.hash_digest(), signature)
            .map_err(TransactionError::from)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            10.5,
        );

        assert_eq!(transaction.sender.as_ref(), Some(sender.address()));
        assert_eq!(transaction.recipient, *recipient.address());
        assert_eq!(transaction.amount, 10.5);
        assert!(transaction.signature.is_none());
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_hash_is_idempotent() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            42.0,
        );

        assert_eq!(transaction.calculate_hash(), transaction.calculate_hash());
    }

    #[test]
    fn test_sign_and_verify() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let mut transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            10.0,
        );

        transaction.sign(&sender).unwrap();

        assert!(transaction.signature.is_some());
        assert!(transaction.verify().unwrap());
    }

    #[test]
    fn test_sign_with_foreign_key_fails() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();
        let intruder = Wallet::new().unwrap();

        let mut transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            10.0,
        );

        let err = transaction.sign(&intruder).unwrap_err();
        assert!(matches!(err, TransactionError::KeyMismatch));
        assert!(transaction.signature.is_none());
    }

    #[test]
    fn test_verify_unsigned_fails() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            10.0,
        );

        let err = transaction.verify().unwrap_err();
        assert!(matches!(err, TransactionError::MissingSignature));
    }

    #[test]
    fn test_reward_is_always_valid() {
        let miner = Wallet::new().unwrap();

        let reward = Transaction::new_reward(miner.address().clone(), 100.0);

        assert!(reward.is_reward());
        assert!(reward.signature.is_none());
        assert!(reward.verify().unwrap());
    }

    #[test]
    fn test_signing_a_reward_fails() {
        let miner = Wallet::new().unwrap();

        let mut reward = Transaction::new_reward(miner.address().clone(), 100.0);

        let err = reward.sign(&miner).unwrap_err();
        assert!(matches!(err, TransactionError::RewardNotSignable));
    }

    #[test]
    fn test_tampered_amount_invalidates_signature() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let mut transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            10.0,
        );
        transaction.sign(&sender).unwrap();

        transaction.amount = 1000.0;
        assert!(!transaction.verify().unwrap());
    }

    #[test]
    fn test_tampered_signature_invalidates_transaction() {
        let sender = Wallet::new().unwrap();
        let recipient = Wallet::new().unwrap();

        let mut transaction = Transaction::new(
            sender.address().clone(),
            recipient.address().clone(),
            10.0,
        );
        transaction.sign(&sender).unwrap();

        // Flip one nibble of the compact signature
        let mut raw = transaction.signature.unwrap().0;
        let flipped = if raw.ends_with('0') { '1' } else { '0' };
        raw.pop();
        raw.push(flipped);
        transaction.signature = Some(DigitalSignature(raw));

        assert!(!transaction.verify().unwrap_or(false));
    }
}
