//! AES-256-GCM encryption of individual text fields.
//!
//! Every value gets its own random salt and IV. The AES key is derived from
//! the configured secret with PBKDF2-HMAC-SHA512 over that salt, so two
//! encryptions of the same plaintext never share a key or nonce.
//!
//! Encoded layout (hex): `salt[64] | iv[12] | tag[16] | ciphertext`

use std::env;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use thiserror::Error;
use tracing::{debug, error};

pub const SALT_LEN: usize = 64;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const HEADER_LEN: usize = SALT_LEN + IV_LEN + TAG_LEN;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Encrypted value is not valid hex")]
    InvalidEncoding,

    #[error("Encrypted value is too short ({0} bytes)")]
    Truncated(usize),

    /// Wrong key or tampered data
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    #[error("Encryption configuration error: {0}")]
    Config(String),
}

/// Secret and KDF cost for the field encryptor
#[derive(Clone)]
pub struct EncryptionConfig {
    pub secret: String,
    pub iterations: u32,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("secret", &"<redacted>")
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl EncryptionConfig {
    pub const DEFAULT_ITERATIONS: u32 = 100_000;

    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }

    /// Load from `FIELD_ENCRYPTION_KEY` and `FIELD_ENCRYPTION_ITERATIONS`
    pub fn from_env() -> Result<Self, EncryptionError> {
        let secret = env::var("FIELD_ENCRYPTION_KEY")
            .map_err(|_| EncryptionError::Config("FIELD_ENCRYPTION_KEY environment variable not found".to_string()))?;
        if secret.trim().is_empty() {
            return Err(EncryptionError::Config("FIELD_ENCRYPTION_KEY must not be empty".to_string()));
        }

        let iterations = match env::var("FIELD_ENCRYPTION_ITERATIONS") {
            Ok(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| EncryptionError::Config(format!("Invalid FIELD_ENCRYPTION_ITERATIONS: {}", value)))?,
            Err(_) => Self::DEFAULT_ITERATIONS,
        };

        Ok(Self { secret, iterations })
    }
}

/// Encrypts and decrypts single text fields
#[derive(Debug, Clone)]
pub struct FieldEncryptor {
    config: EncryptionConfig,
}

impl FieldEncryptor {
    pub fn new(config: EncryptionConfig) -> Result<Self, EncryptionError> {
        if config.secret.is_empty() {
            return Err(EncryptionError::Config("encryption secret must not be empty".to_string()));
        }
        if config.iterations == 0 {
            return Err(EncryptionError::Config("iterations must be positive".to_string()));
        }
        Ok(Self { config })
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha512>(self.config.secret.as_bytes(), salt, self.config.iterations, &mut key);
        key
    }

    fn cipher(&self, salt: &[u8]) -> Result<Aes256Gcm, EncryptionError> {
        let key = self.derive_key(salt);
        Aes256Gcm::new_from_slice(&key).map_err(|_| EncryptionError::Config("derived key has wrong length".to_string()))
    }

    /// Encrypt a value into the hex layout
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let sealed = self
            .cipher(&salt)?
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| {
                error!("AES-GCM encryption failed: {}", e);
                EncryptionError::EncryptionFailed
            })?;

        // aes-gcm appends the tag; the stored layout puts it before the ciphertext
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&iv);
        out.extend_from_slice(tag);
        out.extend_from_slice(ciphertext);

        Ok(hex::encode(out))
    }

    /// Decrypt a value produced by [`FieldEncryptor::encrypt`]
    pub fn decrypt(&self, encoded: &str) -> Result<String, EncryptionError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| EncryptionError::InvalidEncoding)?;
        if bytes.len() < HEADER_LEN {
            return Err(EncryptionError::Truncated(bytes.len()));
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (iv, rest) = rest.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        let plaintext = self
            .cipher(salt)?
            .decrypt(Nonce::from_slice(iv), sealed.as_slice())
            .map_err(|_| {
                debug!("AES-GCM authentication failed");
                EncryptionError::DecryptionFailed
            })?;

        String::from_utf8(plaintext).map_err(|_| EncryptionError::InvalidUtf8)
    }

    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> Result<Option<String>, EncryptionError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    pub fn decrypt_optional(&self, encoded: Option<&str>) -> Result<Option<String>, EncryptionError> {
        encoded.map(|e| self.decrypt(e)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor(secret: &str) -> FieldEncryptor {
        FieldEncryptor::new(EncryptionConfig {
            secret: secret.to_string(),
            iterations: 1_000,
        })
        .unwrap()
    }

    #[test]
    fn test_encrypt_then_decrypt() {
        let enc = encryptor("clinic-secret");
        let encoded = enc.encrypt("BP 150/95, start amlodipine 5mg").unwrap();

        assert_eq!(enc.decrypt(&encoded).unwrap(), "BP 150/95, start amlodipine 5mg");
    }

    #[test]
    fn test_layout_and_fresh_randomness() {
        let enc = encryptor("clinic-secret");
        let first = enc.encrypt("same text").unwrap();
        let second = enc.encrypt("same text").unwrap();

        assert_ne!(first, second);
        // hex: two characters per byte
        assert_eq!(first.len(), (HEADER_LEN + "same text".len()) * 2);
        assert_ne!(&first[..SALT_LEN * 2], &second[..SALT_LEN * 2]);
    }

    #[test]
    fn test_empty_string_round_trips() {
        let enc = encryptor("clinic-secret");
        let encoded = enc.encrypt("").unwrap();
        assert_eq!(encoded.len(), HEADER_LEN * 2);
        assert_eq!(enc.decrypt(&encoded).unwrap(), "");
    }

    #[test]
    fn test_tampered_value_is_rejected() {
        let enc = encryptor("clinic-secret");
        let encoded = enc.encrypt("confidential").unwrap();

        let mut bytes = hex::decode(&encoded).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(matches!(
            enc.decrypt(&hex::encode(bytes)),
            Err(EncryptionError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_wrong_secret_truncated_and_garbage_inputs() {
        let encoded = encryptor("clinic-secret").encrypt("confidential").unwrap();

        assert!(matches!(
            encryptor("other-secret").decrypt(&encoded),
            Err(EncryptionError::DecryptionFailed)
        ));
        assert!(matches!(
            encryptor("clinic-secret").decrypt(&encoded[..40]),
            Err(EncryptionError::Truncated(20))
        ));
        assert!(matches!(
            encryptor("clinic-secret").decrypt("zz-not-hex"),
            Err(EncryptionError::InvalidEncoding)
        ));
    }

    #[test]
    fn test_optional_helpers() {
        let enc = encryptor("clinic-secret");
        assert_eq!(enc.encrypt_optional(None).unwrap(), None);

        let encoded = enc.encrypt_optional(Some("follow up")).unwrap();
        assert_eq!(enc.decrypt_optional(encoded.as_deref()).unwrap().as_deref(), Some("follow up"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(FieldEncryptor::new(EncryptionConfig { secret: String::new(), iterations: 10 }).is_err());
        assert!(FieldEncryptor::new(EncryptionConfig { secret: "x".into(), iterations: 0 }).is_err());
    }
}
