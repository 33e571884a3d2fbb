use crate::Encryptor;
use crate::error::CryptoError;
use crate::kdf::{self, DEFAULT_SALT};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const KDF_INFO: &[u8] = b"yoki:aes-256-cbc:v1";

/// Reference password encryptor: AES-256-CBC with PKCS#7 padding.
///
/// Key and IV are both derived from the password, so the same plaintext always yields the
/// same ciphertext. CBC carries no authentication: a wrong password usually surfaces as a
/// padding error, but may decrypt to garbage that only a later parse rejects. Prefer
/// [`AeadEncryptor`](crate::AeadEncryptor) when tampering must be detected.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AesCbc {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl std::fmt::Debug for AesCbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbc").finish_non_exhaustive()
    }
}

impl AesCbc {
    /// Derives key and IV from `password` using the default salt.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidConfiguration`] for an empty password.
    pub fn from_password(password: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        Self::from_password_with_salt(password, DEFAULT_SALT)
    }

    /// Derives key and IV from `password` and an application-specific `salt`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidConfiguration`] for an empty password.
    pub fn from_password_with_salt(
        password: impl AsRef<[u8]>,
        salt: impl AsRef<[u8]>,
    ) -> Result<Self, CryptoError> {
        let password = password.as_ref();
        if password.is_empty() {
            return Err(CryptoError::InvalidConfiguration {
                message: "Password cannot be empty".into(),
                context: Some("AES-256-CBC".into()),
            });
        }

        let mut material = [0u8; KEY_LEN + IV_LEN];
        kdf::derive(password, salt.as_ref(), KDF_INFO, &mut material)?;

        let mut this = Self { key: [0; KEY_LEN], iv: [0; IV_LEN] };
        this.key.copy_from_slice(&material[..KEY_LEN]);
        this.iv.copy_from_slice(&material[KEY_LEN..]);
        material.zeroize();

        Ok(this)
    }

    /// Uses raw key and IV bytes.
    #[must_use]
    pub const fn from_key_iv(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        Self { key, iv }
    }
}

impl Encryptor for AesCbc {
    fn algorithm(&self) -> &'static str {
        "aes-256-cbc"
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.iv).map_err(|_| {
            CryptoError::InvalidConfiguration {
                message: "Invalid key or IV length".into(),
                context: Some("AES-256-CBC".into()),
            }
        })?;
        Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::InvalidPayload {
                message: format!(
                    "Ciphertext length {} is not a positive multiple of {BLOCK_LEN}",
                    ciphertext.len()
                )
                .into(),
                context: Some("AES-256-CBC".into()),
            });
        }

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.iv).map_err(|_| {
            CryptoError::InvalidConfiguration {
                message: "Invalid key or IV length".into(),
                context: Some("AES-256-CBC".into()),
            }
        })?;
        cipher.decrypt_padded_vec_mut::<Pkcs7>(ciphertext).map_err(|_| CryptoError::Decryption {
            message: "Padding check failed".into(),
            context: Some("Wrong key or corrupted data".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_is_deterministic() {
        let a = AesCbc::from_password("hunter2").unwrap();
        let b = AesCbc::from_password("hunter2").unwrap();
        assert_eq!(a.encrypt(b"payload").unwrap(), b.encrypt(b"payload").unwrap());
    }

    #[test]
    fn output_is_block_aligned() {
        let cbc = AesCbc::from_password("hunter2").unwrap();
        assert_eq!(cbc.encrypt(b"").unwrap().len(), 16);
        assert_eq!(cbc.encrypt(&[7u8; 16]).unwrap().len(), 32);
    }

    #[test]
    fn salt_changes_the_key() {
        let a = AesCbc::from_password_with_salt("pw", "game-a").unwrap();
        let b = AesCbc::from_password_with_salt("pw", "game-b").unwrap();
        assert_ne!(a.encrypt(b"x").unwrap(), b.encrypt(b"x").unwrap());
    }

    #[test]
    fn misaligned_ciphertext_is_invalid_payload() {
        let cbc = AesCbc::from_password("pw").unwrap();
        assert!(matches!(cbc.decrypt(&[1, 2, 3]), Err(CryptoError::InvalidPayload { .. })));
        assert!(matches!(cbc.decrypt(&[]), Err(CryptoError::InvalidPayload { .. })));
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(
            AesCbc::from_password(""),
            Err(CryptoError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let cbc = AesCbc::from_key_iv([0xAB; 32], [0xCD; 16]);
        assert_eq!(format!("{cbc:?}"), "AesCbc { .. }");
    }
}
