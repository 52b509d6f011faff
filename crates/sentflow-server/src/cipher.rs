//! Credential encryption service.
//!
//! Stored format: `$enc$<base64-salt>$<base64-token>` where the token is
//! a 12-byte nonce followed by the AES-256-GCM ciphertext. The key is
//! derived per record from the master key with PBKDF2-HMAC-SHA256 over a
//! random 16-byte salt.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const PBKDF2_ITERATIONS: u32 = 100_000;
const FORMAT_PREFIX: &str = "$enc$";

/// Errors that can occur during credential cipher operations.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Invalid encryption format")]
    InvalidFormat,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Keyed symmetric cipher with a fresh salt per record.
#[derive(Clone)]
pub struct CipherService {
    master_key: String,
}

impl CipherService {
    pub fn new(master_key: impl Into<String>) -> Self {
        Self {
            master_key: master_key.into(),
        }
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(
            self.master_key.as_bytes(),
            salt,
            PBKDF2_ITERATIONS,
            &mut key,
        );
        key
    }

    /// Encrypt a plaintext string into the `$enc$` wire format.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let cipher = Aes256Gcm::new_from_slice(&self.derive_key(&salt))
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encryption(e.to_string()))?;

        let mut token = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&ciphertext);

        Ok(format!(
            "{FORMAT_PREFIX}{}${}",
            URL_SAFE.encode(salt),
            URL_SAFE.encode(token)
        ))
    }

    /// Decrypt a `$enc$`-formatted string back to the plaintext.
    pub fn decrypt(&self, encrypted: &str) -> Result<String, CipherError> {
        let rest = encrypted
            .strip_prefix(FORMAT_PREFIX)
            .ok_or(CipherError::InvalidFormat)?;

        let (salt_b64, token_b64) = rest.split_once('$').ok_or(CipherError::InvalidFormat)?;
        if token_b64.contains('$') {
            return Err(CipherError::InvalidFormat);
        }

        let salt = URL_SAFE.decode(salt_b64)?;
        let token = URL_SAFE.decode(token_b64)?;
        if token.len() < NONCE_SIZE {
            return Err(CipherError::InvalidFormat);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.derive_key(&salt))
            .map_err(|e| CipherError::Decryption(e.to_string()))?;

        let (nonce_bytes, ciphertext) = token.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| CipherError::Decryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CipherError::Decryption(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = CipherService::new("master-password");
        let secret = r#"{"api_key": "12345"}"#;

        let encrypted = cipher.encrypt(secret).unwrap();
        assert!(encrypted.starts_with("$enc$"));
        assert_eq!(encrypted.split('$').count(), 4);

        assert_eq!(cipher.decrypt(&encrypted).unwrap(), secret);
    }

    #[test]
    fn test_fresh_salt_per_record() {
        let cipher = CipherService::new("master-password");
        let a = cipher.encrypt("same input").unwrap();
        let b = cipher.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = CipherService::new("key-one").encrypt("secret").unwrap();
        let result = CipherService::new("key-two").decrypt(&encrypted);
        assert!(matches!(result, Err(CipherError::Decryption(_))));
    }

    #[test]
    fn test_rejects_non_enc_format() {
        let cipher = CipherService::new("k");
        assert!(matches!(
            cipher.decrypt("plaintext"),
            Err(CipherError::InvalidFormat)
        ));
        assert!(matches!(
            cipher.decrypt("$enc$missing-token-part"),
            Err(CipherError::InvalidFormat)
        ));
    }

    #[test]
    fn test_tampered_token_fails() {
        let cipher = CipherService::new("k");
        let encrypted = cipher.encrypt("secret").unwrap();
        let mut tampered: Vec<char> = encrypted.chars().collect();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = tampered.into_iter().collect();
        assert!(cipher.decrypt(&tampered).is_err());
    }
}
