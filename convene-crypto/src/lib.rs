//! Encryption layer for Convene.
//!
//! Provides per-meeting envelope encryption using:
//! - Argon2id for the verifiable password hash
//! - PBKDF2-HMAC-SHA512 for the deterministic login key
//! - AES-256-CBC for wrapping secrets and sealing records
//!
//! # Architecture
//!
//! The encryption uses a two-tier key system:
//!
//! 1. **Long-term secret**: 32 random bytes generated at registration.
//!    Never stored in plaintext — it is wrapped under a key derived from
//!    the principal's password and unwrapped at every login.
//!
//! 2. **Meeting data key**: a random key generated per meeting. It is
//!    wrapped once per authorized principal (under each principal's
//!    long-term secret) and stored inside that meeting's own store.
//!
//! This architecture allows:
//! - Changing a password without re-encrypting any meeting data
//! - Several principals independently unlocking the same meeting
//! - Deleting a meeting (store + wrapped copies) as a single unit

mod account;
mod envelope;
mod error;
mod kdf;

pub use account::{create_account, login, rewrap_secret, AccountMaterial};
pub use envelope::{
    generate_iv, open, seal, unwrap, wrap, Envelope, IV_LEN,
};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{
    derive_login_key, generate_data_key, generate_kdf_salt, generate_secret, hash_password,
    verify_password, KdfConfig, LongTermSecret, MeetingDataKey, WrapKey, KEY_SIZE,
};
