//! Chromium cookie decryption.
//!
//! The desktop client stores the `d` cookie as `v10`/`v11` followed by the
//! ciphertext. On macOS and Linux the key is derived from the OS-held
//! password with PBKDF2 and used for AES-128-CBC; on Windows the key from
//! `Local State` is used directly for AES-256-GCM.

use aes::Aes128;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

use crate::AuthError;

/// Length of the `v10`/`v11` marker in front of every encrypted value.
pub const VERSION_PREFIX_LEN: usize = 3;
pub const SALT: &[u8] = b"saltysalt";

const KEY_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const IV: [u8; BLOCK_LEN] = [b' '; BLOCK_LEN];
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Cipher strategy, picked once from the platform's secret store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieCipher {
    /// PBKDF2-HMAC-SHA1 key derivation, then AES-128-CBC with PKCS#7 padding.
    Unix { iterations: u32 },
    /// Master key is the AES-256-GCM key; nonce is embedded in the value.
    Windows,
}

impl CookieCipher {
    pub fn decrypt(&self, encrypted: &[u8], master_key: &[u8]) -> Result<String, AuthError> {
        let payload = strip_version_prefix(encrypted)?;
        let plaintext = match *self {
            CookieCipher::Unix { iterations } => decrypt_cbc(payload, master_key, iterations)?,
            CookieCipher::Windows => decrypt_gcm(payload, master_key)?,
        };

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::DecryptionFailed(format!("cookie is not valid UTF-8: {}", e)))
    }
}

/// Derive the 16-byte AES key Chromium uses on Unix platforms.
pub fn derive_key(password: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha1>(password, SALT, iterations, &mut key);
    key
}

fn strip_version_prefix(encrypted: &[u8]) -> Result<&[u8], AuthError> {
    if encrypted.len() <= VERSION_PREFIX_LEN {
        return Err(AuthError::DecryptionFailed(format!(
            "encrypted value too short ({} bytes)",
            encrypted.len()
        )));
    }
    Ok(&encrypted[VERSION_PREFIX_LEN..])
}

fn decrypt_cbc(payload: &[u8], password: &[u8], iterations: u32) -> Result<Vec<u8>, AuthError> {
    if payload.len() % BLOCK_LEN != 0 {
        return Err(AuthError::DecryptionFailed(format!(
            "ciphertext length {} is not a multiple of the block size",
            payload.len()
        )));
    }

    let key = derive_key(password, iterations);
    let mut buf = payload.to_vec();
    let plaintext = Aes128CbcDec::new(&key.into(), &IV.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| AuthError::DecryptionFailed("invalid padding (wrong key?)".to_string()))?;

    Ok(plaintext.to_vec())
}

fn decrypt_gcm(payload: &[u8], key: &[u8]) -> Result<Vec<u8>, AuthError> {
    if payload.len() < NONCE_LEN + TAG_LEN {
        return Err(AuthError::DecryptionFailed(format!(
            "ciphertext too short for AES-GCM ({} bytes)",
            payload.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| AuthError::DecryptionFailed(format!("invalid key length: {}", e)))?;
    let (nonce, ciphertext) = payload.split_at(NONCE_LEN);

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| AuthError::DecryptionFailed(format!("AES-GCM open failed: {}", e)))
}
