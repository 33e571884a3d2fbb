use aead::Nonce;
use aead::inout::InOutBuf;
use getrandom::fill;

use crate::Encryptor;
use crate::builder::AeadBuilder;
use crate::error::CryptoError;
use crate::types::{
    AeadCipher, Aes, FLAG_COMPRESSED, HEADER_LEN, MIN_PAYLOAD_LEN, NONCE_LEN, PAYLOAD_VERSION_V1,
    TAG_LEN,
};

/// Authenticated save-payload encryptor.
///
/// Every call draws a fresh random 96-bit nonce and emits a versioned blob:
///
/// ```text
/// [V(1)][FLAGS(1)][NONCE(12)][CIPHERTEXT(N)][TAG(16)]
/// ```
///
/// `FLAGS` records whether the plaintext was LZ4-compressed, so a reader never needs to
/// know the writer's settings. A wrong key, a different associated context, or any flipped
/// bit fails with [`CryptoError::Decryption`].
///
/// ### Generic Parameters
/// * `C`: The cipher implementation. Defaults to [`Aes`] (AES-256-GCM).
///
/// ### Example
/// ```rust
/// use yoki_crypto::{AeadEncryptor, ChaCha, CryptoError, Encryptor};
///
/// # fn main() -> Result<(), CryptoError> {
/// let encryptor = AeadEncryptor::<ChaCha>::builder()
///     .compression(true)
///     .derived_key("correct horse battery staple", "my-game")?
///     .build()?;
///
/// let sealed = encryptor.encrypt(b"module table bytes")?;
/// assert_eq!(encryptor.decrypt(&sealed)?, b"module table bytes");
/// # Ok(())
/// # }
/// ```
pub struct AeadEncryptor<C: AeadCipher = Aes> {
    pub(crate) cipher: C,
    pub(crate) compression: bool,
    pub(crate) aad: Vec<u8>,
}

impl<C: AeadCipher> std::fmt::Debug for AeadEncryptor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadEncryptor")
            .field("cipher", &std::any::type_name::<C>())
            .field("compression", &self.compression)
            .field("aad_len", &self.aad.len())
            .finish_non_exhaustive()
    }
}

impl<C: AeadCipher> AeadEncryptor<C> {
    /// Returns a new [`AeadBuilder`] to configure the encryptor.
    #[must_use]
    pub fn builder() -> AeadBuilder<C> {
        AeadBuilder::<C>::new()
    }

    fn next_nonce() -> Result<Nonce<C>, CryptoError> {
        let mut nonce = Nonce::<C>::default();
        fill(&mut nonce).map_err(|err| CryptoError::Encryption {
            message: format!("System RNG unavailable: {err}").into(),
            context: Some("Nonce generation".into()),
        })?;
        Ok(nonce)
    }

    fn seal(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        // Compression precedes encryption and leaks plaintext compressibility through length.
        let owned = if self.compression { lz4_flex::compress_prepend_size(data) } else { Vec::new() };
        let data = if self.compression { owned.as_slice() } else { data };
        let flags = if self.compression { FLAG_COMPRESSED } else { 0 };

        let nonce = Self::next_nonce()?;

        let mut buf = Vec::with_capacity(MIN_PAYLOAD_LEN + data.len());
        buf.push(PAYLOAD_VERSION_V1);
        buf.push(flags);
        buf.extend_from_slice(&nonce);
        buf.extend_from_slice(data);

        let (_hdr, rest) = buf.split_at_mut(HEADER_LEN);
        let (_nonce_part, data_part) = rest.split_at_mut(NONCE_LEN);
        let in_out = InOutBuf::from(data_part);

        let tag = self.cipher.encrypt_inout_detached(&nonce, &self.aad, in_out).map_err(|_| {
            CryptoError::Encryption {
                message: "Encryption failed".into(),
                context: Some("AEAD encryption failed".into()),
            }
        })?;

        buf.extend_from_slice(tag.as_slice());
        Ok(buf)
    }

    fn open(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < MIN_PAYLOAD_LEN {
            return Err(CryptoError::InvalidPayload {
                message: format!(
                    "Payload too short ({} bytes). Expected at least {MIN_PAYLOAD_LEN} bytes",
                    blob.len()
                )
                .into(),
                context: None,
            });
        }

        let (header, rest) = blob.split_at(HEADER_LEN);
        let (version, flags) = (header[0], header[1]);

        if version != PAYLOAD_VERSION_V1 {
            return Err(CryptoError::InvalidPayload {
                message: "Unsupported payload version".into(),
                context: Some(format!("version={version}").into()),
            });
        }

        let (nonce_slice, rest) = rest.split_at(NONCE_LEN);
        let (ciphertext, tag_slice) = rest.split_at(rest.len() - TAG_LEN);

        let nonce = nonce_slice.try_into().map_err(|_| CryptoError::InvalidPayload {
            message: "Invalid nonce length".into(),
            context: None,
        })?;

        let tag = tag_slice.try_into().map_err(|_| CryptoError::InvalidPayload {
            message: "Invalid tag length".into(),
            context: None,
        })?;

        let mut buf = ciphertext.to_vec();
        let in_out = InOutBuf::from(&mut buf[..]);

        self.cipher.decrypt_inout_detached(&nonce, &self.aad, in_out, &tag).map_err(|_| {
            CryptoError::Decryption {
                message: "Decryption failed".into(),
                context: Some("AEAD authentication failed".into()),
            }
        })?;

        if (flags & FLAG_COMPRESSED) != 0 {
            buf = lz4_flex::decompress_size_prepended(&buf).map_err(|_| {
                CryptoError::InvalidPayload {
                    message: "Decompression failed".into(),
                    context: Some("LZ4 stream invalid".into()),
                }
            })?;
        }

        Ok(buf)
    }
}

impl<C: AeadCipher> Encryptor for AeadEncryptor<C> {
    fn algorithm(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.seal(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.open(ciphertext)
    }
}
