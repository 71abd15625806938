//! Field-level encryption for clinical data at rest

pub mod field_encryption;

pub use field_encryption::{EncryptionConfig, EncryptionError, FieldEncryptor};
