//! One-way secret hashing, reversible encryption for operational
//! secrets, and salt generation.
//!
//! `hash_secret` is deterministic for identical inputs; auth-token
//! re-derivation depends on that. The reversible cipher is only for
//! stored operational secrets (datasource passwords and the like),
//! never for user credentials.
//!
//! At production iteration counts the KDF is latency-significant; keep
//! these calls off any single-threaded dispatcher that serves requests.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use base64ct::{Base64, Encoding};
use pbkdf2::pbkdf2_hmac;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256, Sha512};
use tracing::warn;

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const CIPHER_KEY_BITS: u32 = 256;
const CIPHER_IV_BYTES: usize = 16;

/// Digest algorithms a policy may name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Resolve a policy-supplied name.
    ///
    /// # Errors
    /// Returns `CryptoError::UnsupportedAlgorithm` for unknown names.
    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        match name.to_ascii_lowercase().as_str() {
            "sha-256" | "sha256" => Ok(Self::Sha256),
            "sha-512" | "sha512" => Ok(Self::Sha512),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Derive a key from `secret` and `salt`, then digest the derived bytes
/// into a hex string. Deterministic given identical inputs.
///
/// # Errors
/// Returns `CryptoError::UnsupportedAlgorithm` when `digest_name` is
/// not a supported digest.
pub fn hash_secret(
    secret: &str,
    salt: &str,
    iterations: u32,
    key_bits: u32,
    digest_name: &str,
) -> Result<String, CryptoError> {
    let digest = DigestAlgorithm::from_name(digest_name)?;
    let mut derived = vec![0u8; (key_bits / 8) as usize];
    let hashed = match digest {
        DigestAlgorithm::Sha256 => {
            pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt.as_bytes(), iterations, &mut derived);
            hex::encode(Sha256::digest(&derived))
        }
        DigestAlgorithm::Sha512 => {
            pbkdf2_hmac::<Sha512>(secret.as_bytes(), salt.as_bytes(), iterations, &mut derived);
            hex::encode(Sha512::digest(&derived))
        }
    };
    Ok(hashed)
}

/// Encrypt `plaintext` under a key derived from `salt`, returning the
/// random IV and the ciphertext as colon-delimited base64.
///
/// # Errors
/// Returns `CryptoError::UnsupportedAlgorithm` unless the named cipher
/// is AES-256 in CBC mode.
pub fn encrypt_reversible(
    plaintext: &str,
    salt: &str,
    iterations: u32,
    key_bits: u32,
    cipher_algorithm: &str,
    cipher_mode: &str,
) -> Result<String, CryptoError> {
    let key = cipher_key(salt, iterations, key_bits, cipher_algorithm, cipher_mode)?;

    let mut iv = [0u8; CIPHER_IV_BYTES];
    OsRng.fill_bytes(&mut iv);

    let cipher =
        Aes256CbcEnc::new_from_slices(&key, &iv).map_err(|_| CryptoError::CipherFailure)?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(format!(
        "{}:{}",
        Base64::encode_string(&iv),
        Base64::encode_string(&ciphertext)
    ))
}

/// Reverse [`encrypt_reversible`]. Bad padding, a wrong key, and
/// malformed input all fail with an opaque `CryptoError`.
///
/// # Errors
/// Returns `CryptoError` on any decode or cipher failure.
pub fn decrypt_reversible(
    payload: &str,
    salt: &str,
    iterations: u32,
    key_bits: u32,
    cipher_algorithm: &str,
    cipher_mode: &str,
) -> Result<String, CryptoError> {
    let key = cipher_key(salt, iterations, key_bits, cipher_algorithm, cipher_mode)?;

    let (iv_part, ct_part) = payload
        .split_once(':')
        .ok_or(CryptoError::MalformedPayload)?;
    let iv = Base64::decode_vec(iv_part).map_err(|_| CryptoError::MalformedPayload)?;
    let ciphertext = Base64::decode_vec(ct_part).map_err(|_| CryptoError::MalformedPayload)?;
    if iv.len() != CIPHER_IV_BYTES {
        return Err(CryptoError::MalformedPayload);
    }

    let cipher = Aes256CbcDec::new_from_slices(&key, &iv).map_err(|_| CryptoError::CipherFailure)?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::CipherFailure)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::CipherFailure)
}

/// Generate a salt: `length` CSPRNG bytes digested to hex.
///
/// Falls back to a secure alphanumeric string when the named digest is
/// unavailable; the fallback is a policy violation and is logged as
/// such rather than silently accepted.
pub fn generate_salt(algorithm_name: &str, length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);

    match DigestAlgorithm::from_name(algorithm_name) {
        Ok(DigestAlgorithm::Sha256) => hex::encode(Sha256::digest(&bytes)),
        Ok(DigestAlgorithm::Sha512) => hex::encode(Sha512::digest(&bytes)),
        Err(_) => {
            warn!("policy violation: digest {algorithm_name} unavailable, using alphanumeric salt");
            random_alphanumeric(length)
        }
    }
}

/// Fixed-length random alphanumeric token, also used for reset ids.
#[must_use]
pub fn random_alphanumeric(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn cipher_key(
    salt: &str,
    iterations: u32,
    key_bits: u32,
    cipher_algorithm: &str,
    cipher_mode: &str,
) -> Result<[u8; 32], CryptoError> {
    if !cipher_algorithm.eq_ignore_ascii_case("aes")
        || !cipher_mode.eq_ignore_ascii_case("cbc")
        || key_bits != CIPHER_KEY_BITS
    {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "{cipher_algorithm}-{key_bits}-{cipher_mode}"
        )));
    }

    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha512>(salt.as_bytes(), salt.as_bytes(), iterations, &mut key);
    Ok(key)
}
