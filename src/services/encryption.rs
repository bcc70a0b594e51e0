//! Secret cipher for connected-account credentials at rest.
//!
//! AES-256-GCM with a fresh random nonce per call, so encrypting the same
//! plaintext twice yields different ciphertexts. The AES key is derived from
//! the configured passphrase with HMAC-SHA256 over a fixed context string.
//! Stored values are base64 of `nonce (12 bytes) || ciphertext+tag`.
//!
//! Plaintext secrets exist only in memory between request parsing and
//! encryption; nothing in this module logs or persists them.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation context for key derivation. Changing it invalidates
/// every stored ciphertext.
const KEY_CONTEXT: &[u8] = b"contentdesk/secret-cipher/aes-256-gcm/v1";

/// Nonce length for AES-GCM.
const NONCE_LEN: usize = 12;

/// GCM authentication tag length.
const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum CipherError {
    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Stored value is not valid base64")]
    MalformedCiphertext,

    #[error("Ciphertext too short to contain nonce and tag")]
    CiphertextTooShort,

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

/// Reversible cipher for third-party credentials.
pub struct SecretCipher {
    key: [u8; 32],
}

impl SecretCipher {
    /// Build from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 32 {
            return Err(CipherError::InvalidKeyLength(key.len()));
        }
        let mut buf = [0u8; 32];
        buf.copy_from_slice(key);
        Ok(Self { key: buf })
    }

    /// Build from the configured passphrase, deriving the AES key.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self {
            key: derive_key(passphrase),
        }
    }

    /// Encrypt a credential for storage. Returns base64 of nonce||ciphertext.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, CipherError> {
        let bytes = self.encrypt(plaintext.as_bytes())?;
        Ok(BASE64.encode(bytes))
    }

    /// Decrypt a stored credential back to the original string.
    pub fn decrypt_str(&self, stored: &str) -> Result<String, CipherError> {
        let bytes = BASE64
            .decode(stored)
            .map_err(|_| CipherError::MalformedCiphertext)?;
        let plaintext = self.decrypt(&bytes)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::DecryptionFailed)
    }

    /// Encrypt raw bytes. Output layout: nonce (12 bytes) || ciphertext+tag.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt bytes produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::CiphertextTooShort);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)
    }
}

/// Derive the AES-256 key from a passphrase: HMAC-SHA256 keyed by the
/// passphrase over the fixed context string.
fn derive_key(passphrase: &str) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(passphrase.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(KEY_CONTEXT);
    let digest = mac.finalize().into_bytes();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}
