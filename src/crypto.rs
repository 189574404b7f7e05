//! Cryptographic primitives for the ledger

use crate::error::ChainError;
use crate::primitives::{Address, Hash, Signature, ADDRESS_SIZE, HASH_SIZE, SIGNATURE_SIZE};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash of two concatenated digests, used for inner merkle nodes.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Derives an address from a compressed public key: the last 20 bytes of its SHA-256.
pub fn address_from_public_key(public_key_bytes: &[u8]) -> Address {
    let digest = sha256(public_key_bytes);
    let mut address = [0u8; ADDRESS_SIZE];
    address.copy_from_slice(&digest[HASH_SIZE - ADDRESS_SIZE..]);
    address
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Signs a 32-byte digest, returning the compact signature followed by the recovery id.
    pub fn sign_digest(&self, digest: &Hash) -> Result<Signature, ChainError> {
        let message = Message::from_digest_slice(digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

        let recoverable = SECP256K1_CONTEXT.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = recoverable.serialize_compact();

        let mut out = [0u8; SIGNATURE_SIZE];
        out[..64].copy_from_slice(&compact);
        out[64] = recovery_id.to_i32() as u8;
        Ok(Signature(out))
    }
}

/// Recovers the compressed public key that produced `signature` over `digest`.
pub fn recover_public_key(digest: &Hash, signature: &Signature) -> Result<[u8; PUBLIC_KEY_SIZE], ChainError> {
    let bytes = signature.as_bytes();
    let recovery_id = RecoveryId::from_i32(i32::from(bytes[64]))
        .map_err(|e| ChainError::CryptoError(format!("Invalid recovery id: {}", e)))?;
    let recoverable = RecoverableSignature::from_compact(&bytes[..64], recovery_id)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;
    let message = Message::from_digest_slice(digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

    let public_key = SECP256K1_CONTEXT
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))?;
    Ok(public_key.serialize())
}

/// Verifies that `signature` over `digest` was produced by the holder of `public_key_bytes`.
pub fn verify_signature(public_key_bytes: &[u8], digest: &Hash, signature: &Signature) -> Result<(), ChainError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }

    let recovered = recover_public_key(digest, signature)?;
    if recovered.as_slice() != public_key_bytes {
        return Err(ChainError::CryptoError("Signature verification failed".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_twenty_bytes_of_pubkey_hash() {
        let keypair = KeyPair::generate();
        let digest = sha256(&keypair.public_key_bytes());
        assert_eq!(keypair.address().as_slice(), &digest[12..]);
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let digest = sha256(b"ledger message");

        let signature = keypair.sign_digest(&digest).unwrap();
        assert!(signature.as_bytes()[64] <= 3);
        assert!(verify_signature(&keypair.public_key_bytes(), &digest, &signature).is_ok());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let digest = sha256(b"payload");

        let signature = signer.sign_digest(&digest).unwrap();
        let result = verify_signature(&other.public_key_bytes(), &digest, &signature);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Cryptographic error: Signature verification failed"
        );
    }

    #[test]
    fn test_tampered_digest_rejected() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign_digest(&sha256(b"original")).unwrap();
        assert!(verify_signature(&keypair.public_key_bytes(), &sha256(b"tampered"), &signature).is_err());
    }

    #[test]
    fn test_short_public_key_rejected() {
        let keypair = KeyPair::generate();
        let digest = sha256(b"x");
        let signature = keypair.sign_digest(&digest).unwrap();
        let err = verify_signature(&keypair.public_key_bytes()[1..], &digest, &signature).unwrap_err();
        assert!(err.to_string().contains("Public key must be exactly"));
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = KeyPair::from_secret_bytes(&short_bytes);
        assert!(result.unwrap_err().to_string().contains("Secret key must be"));
    }

    #[test]
    fn test_hash_pair_is_order_sensitive() {
        let a = sha256(b"a");
        let b = sha256(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }
}
