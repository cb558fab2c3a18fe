use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;
use std::str::FromStr;

/// Shared secp256k1 context, created once.
static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Failed to sign message: {0}")]
    SigningError(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents a wallet address (compressed secp256k1 public key in hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Address(hex::encode(public_key.serialize()))
    }

    /// Converts the address back into a public key
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        PublicKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Validate that the string decodes to a point on the curve
        let address = Address(s.to_string());
        address.to_public_key()?;

        Ok(address)
    }
}

/// Represents a digital signature (compact ECDSA encoding in hex)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.serialize_compact()))
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0)
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; COMPACT_SIGNATURE_SIZE] =
            bytes.try_into().map_err(|_| {
                CryptoError::InvalidSignature("Invalid signature length".to_string())
            })?;

        Signature::from_compact(&signature_bytes)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Result<Self, CryptoError> {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP, &secret_key);
        let address = Address::from_public_key(&public_key);

        Ok(Wallet {
            secret_key,
            public_key,
            address,
        })
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        if secret_key_bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "Private key must be {} bytes, got {}",
                SECRET_KEY_SIZE,
                secret_key_bytes.len()
            )));
        }

        let secret_key = SecretKey::from_slice(secret_key_bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let public_key = PublicKey::from_secret_key(&SECP, &secret_key);
        let address = Address::from_public_key(&public_key);

        Ok(Wallet {
            secret_key,
            public_key,
            address,
        })
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs a 32-byte digest with the wallet's private key
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<DigitalSignature, CryptoError> {
        let message = Message::from_digest_slice(digest)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;

        let signature = SECP.sign_ecdsa(&message, &self.secret_key);
        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the wallet's secret key as bytes
    pub fn export_secret_key(&self) -> Vec<u8> {
        self.secret_key.secret_bytes().to_vec()
    }
}

/// Verifies a signature over a 32-byte digest against an address
///
/// Returns `Ok(false)` when the signature simply does not match;
/// malformed keys or signatures are reported as errors.
pub fn verify_digest(
    address: &Address,
    digest: &[u8; 32],
    signature: &DigitalSignature,
) -> Result<bool, CryptoError> {
    let public_key = address.to_public_key()?;
    let signature = signature.to_signature()?;

    let message = Message::from_digest_slice(digest)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    match SECP.verify_ecdsa(&message, &signature, &public_key) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn digest_of(message: &[u8]) -> [u8; 32] {
        Sha256::digest(message).into()
    }

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new().unwrap();
        assert!(!wallet.address().0.is_empty());
        // 33-byte compressed public key in hex
        assert_eq!(wallet.address().0.len(), 66);
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::new().unwrap();
        let digest = digest_of(b"Hello, world!");

        let signature = wallet.sign_digest(&digest).unwrap();

        let result = verify_digest(wallet.address(), &digest, &signature).unwrap();
        assert!(result);

        // Verify with wrong digest
        let wrong_digest = digest_of(b"Wrong message");
        let result = verify_digest(wallet.address(), &wrong_digest, &signature).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let wallet = Wallet::new().unwrap();
        let other = Wallet::new().unwrap();
        let digest = digest_of(b"transfer");

        let signature = other.sign_digest(&digest).unwrap();

        let result = verify_digest(wallet.address(), &digest, &signature).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_address_conversion() {
        let wallet = Wallet::new().unwrap();
        let address = wallet.address();

        let public_key = address.to_public_key().unwrap();
        assert_eq!(public_key, *wallet.public_key());
    }

    #[test]
    fn test_address_parse_rejects_garbage() {
        assert!("not-hex".parse::<Address>().is_err());
        // Valid hex but not a curve point
        assert!(hex::encode([0u8; 33]).parse::<Address>().is_err());
    }

    #[test]
    fn test_wallet_from_secret_key_round_trip() {
        let wallet = Wallet::new().unwrap();
        let exported = wallet.export_secret_key();

        let restored = Wallet::from_secret_key(&exported).unwrap();
        assert_eq!(restored.address(), wallet.address());

        assert!(Wallet::from_secret_key(&exported[1..]).is_err());
    }
}
