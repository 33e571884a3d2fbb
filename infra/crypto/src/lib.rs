//! Payload encryption for save files.
//!
//! The save engine treats encryption as a pluggable [`Encryptor`]: opaque bytes in, opaque
//! bytes out, both fallible. Two families are bundled:
//!
//! * [`AesCbc`]: the reference password encryptor. AES-256-CBC with PKCS#7 padding, key and IV
//!   derived from the password with HKDF-SHA256. Deterministic and unauthenticated.
//! * [`AeadEncryptor`]: AES-256-GCM (default) or ChaCha20-Poly1305 with random nonces,
//!   optional LZ4 compression and an optional associated context. Wrong keys are always
//!   detected.
//!
//! ## Payload Format
//!
//! [`AeadEncryptor`] emits a versioned blob:
//!
//! ```text
//! [V(1)][FLAGS(1)][NONCE(12)][CIPHERTEXT(N)][TAG(16)]
//! ```
//!
//! ## Nonce Policy
//!
//! Random 96-bit nonces are drawn per call. This is probabilistic; for extremely high save
//! volumes under a single key, rotate keys.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use yoki_crypto::{AesCbc, CryptoError, Encryptor};
//!
//! # fn main() -> Result<(), CryptoError> {
//! let encryptor: Arc<dyn Encryptor> = Arc::new(AesCbc::from_password("hunter2")?);
//!
//! let sealed = encryptor.encrypt(b"module table")?;
//! assert_eq!(encryptor.decrypt(&sealed)?, b"module table");
//! # Ok(())
//! # }
//! ```

mod builder;
mod cbc;
mod engine;
mod error;
pub mod kdf;
mod types;

pub use builder::AeadBuilder;
pub use cbc::AesCbc;
pub use engine::AeadEncryptor;
pub use error::{CryptoError, CryptoErrorExt};
pub use types::{AeadCipher, Aes, ChaCha};

/// A reversible, fallible transformation applied to the module table of a save file.
///
/// Implementations must be safe to call from any thread, since background saves run on the
/// tokio pool. `decrypt(encrypt(x)) == x` must hold for every input.
pub trait Encryptor: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs.
    fn algorithm(&self) -> &'static str;

    /// Encrypts a whole payload.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts a whole payload produced by [`Encryptor::encrypt`] with the same key.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
