use crate::engine::AeadEncryptor;
use crate::error::CryptoError;
use crate::kdf;
use crate::types::{AeadCipher, Aes};
use aead::Key;
use private::Sealed;
use std::marker::PhantomData;
use zeroize::{Zeroize, ZeroizeOnDrop};

const KDF_INFO: &[u8] = b"yoki:aead:v1";

#[derive(Debug, Default, ZeroizeOnDrop)]
pub struct NoKey;
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct WithKey([u8; 32]);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoKey {}
impl Sealed for WithKey {}

/// A builder for [`AeadEncryptor`].
///
/// Raw key material is wiped from memory when the builder is consumed or dropped.
#[allow(private_bounds)]
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct AeadBuilder<C: AeadCipher = Aes, K: Sealed + ZeroizeOnDrop = NoKey> {
    #[zeroize(skip)]
    _cipher: PhantomData<C>,
    compression: bool,
    aad: Vec<u8>,
    key: K,
}

impl<C: AeadCipher> Default for AeadBuilder<C> {
    fn default() -> Self {
        Self { _cipher: PhantomData, compression: false, aad: Vec::new(), key: NoKey }
    }
}

impl<C: AeadCipher> AeadBuilder<C> {
    /// Creates a new builder with compression disabled and an empty associated context.
    #[must_use = "Builder must be given a key before use"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the key from a password using HKDF-SHA256.
    ///
    /// # Arguments
    /// * `password`: Input keying material.
    /// * `salt`: Uniquifies keys across applications sharing a password.
    ///
    /// # Errors
    /// Returns [`CryptoError::InvalidConfiguration`] for an empty password.
    pub fn derived_key(
        mut self,
        password: impl AsRef<[u8]>,
        salt: impl AsRef<[u8]>,
    ) -> Result<AeadBuilder<C, WithKey>, CryptoError> {
        if password.as_ref().is_empty() {
            return Err(CryptoError::InvalidConfiguration {
                message: "Password cannot be empty".into(),
                context: Some("AEAD key derivation".into()),
            });
        }

        let mut key = [0u8; 32];
        kdf::derive(password.as_ref(), salt.as_ref(), KDF_INFO, &mut key)?;

        Ok(AeadBuilder {
            _cipher: PhantomData,
            compression: self.compression,
            aad: std::mem::take(&mut self.aad),
            key: WithKey(key),
        })
    }

    /// Uses a raw 256-bit key.
    #[must_use]
    pub fn key(mut self, key: [u8; 32]) -> AeadBuilder<C, WithKey> {
        AeadBuilder {
            _cipher: PhantomData,
            compression: self.compression,
            aad: std::mem::take(&mut self.aad),
            key: WithKey(key),
        }
    }
}

#[allow(private_bounds)]
impl<C: AeadCipher, K: Sealed + ZeroizeOnDrop> AeadBuilder<C, K> {
    /// Toggles LZ4 compression before encryption.
    ///
    /// Compression is recorded in each payload header, so readers do not need the same setting.
    /// It leaks plaintext compressibility through ciphertext length.
    #[must_use]
    pub const fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Binds every payload to an associated context (AEAD associated data).
    ///
    /// Payloads sealed under one context fail to decrypt under any other.
    #[must_use]
    pub fn context(mut self, aad: impl AsRef<[u8]>) -> Self {
        self.aad = aad.as_ref().to_vec();
        self
    }
}

impl<C: AeadCipher> AeadBuilder<C, WithKey> {
    /// Finalizes construction and zeroes the builder.
    ///
    /// # Errors
    /// Returns [`CryptoError::InvalidConfiguration`] if the key does not fit the cipher.
    pub fn build(mut self) -> Result<AeadEncryptor<C>, CryptoError> {
        let key = Key::<C>::try_from(&self.key.0[..]).map_err(|_| {
            CryptoError::InvalidConfiguration {
                message: format!("Invalid key length {}, must be 32 bytes", self.key.0.len())
                    .into(),
                context: Some(std::any::type_name::<C>().into()),
            }
        })?;
        let encryptor = AeadEncryptor {
            cipher: C::new(&key),
            compression: self.compression,
            aad: std::mem::take(&mut self.aad),
        };

        self.zeroize();

        Ok(encryptor)
    }
}
