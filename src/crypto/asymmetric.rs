//! Public-key encryption of short chat messages.
//!
//! Sealed-box construction:
//! 1. Generate an ephemeral X25519 key pair
//! 2. Perform ECDH with the recipient's public key
//! 3. Derive a symmetric key using HKDF-SHA256
//! 4. Encrypt with ChaCha20Poly1305
//!
//! Wire format: `ephemeral_public (32) || nonce (12) || ciphertext+tag`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

/// HKDF info string for key derivation.
const HKDF_INFO: &[u8] = b"CIPHERROOM-V1-SEALED";

/// Nonce size for ChaCha20Poly1305.
const NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag size.
const TAG_SIZE: usize = 16;

/// Largest plaintext accepted by [`encrypt`], in bytes.
///
/// Same as the payload limit of RSA-OAEP with a 2048-bit modulus and SHA-256.
pub const MAX_PLAINTEXT_LEN: usize = 190;

/// Errors that can occur during asymmetric encryption operations.
#[derive(Error, Debug)]
pub enum AsymmetricError {
    #[error("Plaintext too long: {len} bytes (max {max})")]
    PlaintextTooLong { len: usize, max: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid ciphertext: too short")]
    CiphertextTooShort,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}

fn derive_key(shared_secret: &[u8]) -> Result<[u8; 32], AsymmetricError> {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0u8; 32];
    hk.expand(HKDF_INFO, &mut key)
        .map_err(|_| AsymmetricError::KeyDerivationFailed)?;
    Ok(key)
}

/// Encrypts a short message for the holder of `recipient_public`.
pub fn encrypt(recipient_public: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, AsymmetricError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(AsymmetricError::PlaintextTooLong {
            len: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared_secret = ephemeral_secret.diffie_hellman(recipient_public);

    let mut key = derive_key(shared_secret.as_bytes())?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()));
    key.zeroize();
    let cipher = cipher?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| AsymmetricError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(32 + NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(ephemeral_public.as_bytes());
    result.extend_from_slice(&nonce_bytes);
    result.extend(ciphertext);
    Ok(result)
}

/// Decrypts a message produced by [`encrypt`] with our secret key.
///
/// A ciphertext sealed for another key, or altered in transit, fails
/// authentication and yields [`AsymmetricError::DecryptionFailed`].
pub fn decrypt(secret_key: &StaticSecret, data: &[u8]) -> Result<Vec<u8>, AsymmetricError> {
    if data.len() < 32 + NONCE_SIZE + TAG_SIZE {
        return Err(AsymmetricError::CiphertextTooShort);
    }

    let mut ephemeral_bytes = [0u8; 32];
    ephemeral_bytes.copy_from_slice(&data[..32]);
    let ephemeral_public = PublicKey::from(ephemeral_bytes);
    let nonce = Nonce::from_slice(&data[32..32 + NONCE_SIZE]);
    let ciphertext = &data[32 + NONCE_SIZE..];

    let shared_secret = secret_key.diffie_hellman(&ephemeral_public);
    let mut key = derive_key(shared_secret.as_bytes())?;
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| AsymmetricError::KeyDerivationFailed);
    key.zeroize();

    cipher?
        .decrypt(nonce, ciphertext)
        .map_err(|_| AsymmetricError::DecryptionFailed)
}
