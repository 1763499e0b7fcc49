//! Field-level encryption for the credentials envelope.
//!
//! Each envelope field is sealed independently with AES-256-GCM under a key
//! derived from the user secret, so the outer JSON stays a readable map
//! keyed by profile name and profiles can be enumerated without the secret.
//!
//! # Wire format
//!
//! `nonce (12 bytes) || ciphertext || tag (16 bytes)`, base64-encoded by the
//! store before it lands in JSON.
//!
//! # Key derivation
//!
//! The AES-256 key is the SHA-256 of the secret verbatim, which accepts any
//! passphrase length. This is not a memory-hard KDF; switching to one would
//! invalidate every stored envelope, so the scheme stays as-is.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};

use crate::error::CloudCtlError;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// Seal `plaintext` under `secret` with a fresh random nonce.
///
/// Two calls on the same input produce different ciphertexts.
pub fn encrypt(plaintext: &[u8], secret: &str) -> Result<Vec<u8>, CloudCtlError> {
    let cipher = Aes256Gcm::new(&derive_key(secret).into());

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CloudCtlError::InvalidSecretOrCorruptCiphertext)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a sealed value.
///
/// A ciphertext shorter than the nonce and a failed tag check map to the
/// same error; distinguishing them would leak which case applies.
pub fn decrypt(ciphertext: &[u8], secret: &str) -> Result<Vec<u8>, CloudCtlError> {
    if ciphertext.len() < NONCE_LEN {
        return Err(CloudCtlError::InvalidSecretOrCorruptCiphertext);
    }

    let cipher = Aes256Gcm::new(&derive_key(secret).into());
    let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| CloudCtlError::InvalidSecretOrCorruptCiphertext)
}
