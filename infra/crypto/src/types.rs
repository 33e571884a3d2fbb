use aead::{AeadInOut, KeyInit};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;

// --- Aliases ---

pub type Aes = Aes256Gcm;
pub type ChaCha = ChaCha20Poly1305;

pub trait AeadCipher: AeadInOut + KeyInit + Send + Sync + 'static {}
impl<T: AeadInOut + KeyInit + Send + Sync + 'static> AeadCipher for T {}

// --- Payload format constants ---

/// Payload header version.
pub(crate) const PAYLOAD_VERSION_V1: u8 = 1;

/// Header layout: `[version: u8][flags: u8]`
pub(crate) const HEADER_LEN: usize = 2;

/// AEAD nonce length (96-bit).
pub(crate) const NONCE_LEN: usize = 12;

/// AEAD tag length (128-bit).
pub(crate) const TAG_LEN: usize = 16;

/// Flag bit: plaintext was LZ4-compressed before encryption.
pub(crate) const FLAG_COMPRESSED: u8 = 1 << 0;

/// Smallest well-formed payload: header, nonce and tag around an empty ciphertext.
pub(crate) const MIN_PAYLOAD_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN;
