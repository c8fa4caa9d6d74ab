//! Asymmetric key lifecycle with interchangeable storage strategies.
//!
//! Exactly one pair exists per guid and pairs are never regenerated in
//! place: callers remove and create again. Strategies serialize
//! per-guid operations through a keyed mutex; unrelated guids never
//! contend.

pub mod file;
pub mod postgres;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::error::KeyManagementError;

/// One account's keypair, raw bytes as stored.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub guid: Uuid,
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

/// Key lifecycle contract shared by the file and relational strategies.
#[async_trait]
pub trait KeyManager: Send + Sync {
    async fn create_keys(&self, guid: Uuid) -> Result<(), KeyManagementError>;

    async fn return_keys(&self, guid: Uuid) -> Result<KeyPair, KeyManagementError>;

    async fn remove_keys(&self, guid: Uuid) -> Result<(), KeyManagementError>;
}

/// Generate a `(public, private)` pair for the named algorithm from the
/// process CSPRNG.
pub(crate) fn generate_keypair(algorithm: &str) -> Result<(Vec<u8>, Vec<u8>), KeyManagementError> {
    match algorithm.to_ascii_lowercase().as_str() {
        "ed25519" => {
            let signing = SigningKey::generate(&mut OsRng);
            Ok((
                signing.verifying_key().to_bytes().to_vec(),
                signing.to_bytes().to_vec(),
            ))
        }
        other => Err(KeyManagementError::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::generate_keypair;
    use crate::error::KeyManagementError;
    use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

    #[test]
    fn generated_pair_signs_and_verifies() {
        let (public, private) = generate_keypair("ed25519").unwrap();

        let private: [u8; 32] = private.as_slice().try_into().unwrap();
        let signing = SigningKey::from_bytes(&private);
        let signature = signing.sign(b"challenge");

        let public: [u8; 32] = public.as_slice().try_into().unwrap();
        let verifying = VerifyingKey::from_bytes(&public).unwrap();
        assert!(verifying.verify(b"challenge", &signature).is_ok());
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let result = generate_keypair("rsa-4096");
        assert!(matches!(
            result,
            Err(KeyManagementError::UnsupportedAlgorithm(name)) if name == "rsa-4096"
        ));
    }
}
