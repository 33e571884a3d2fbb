//! # Crypto Errors
//!
//! [`CryptoError`] reports failures of the bundled encryptors and key derivation.

use std::borrow::Cow;

/// A specialized [`CryptoError`] enum for payload encryption failures.
#[yoki_derive::yoki_error]
pub enum CryptoError {
    /// Failure during the encryption process.
    #[error("Encryption error{}: {message}", format_context(.context))]
    Encryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Failure during the decryption process.
    ///
    /// Usually an incorrect key, a mismatched associated context, or tampered data.
    #[error("Decryption error{}: {message}", format_context(.context))]
    Decryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The ciphertext is malformed or too short to even attempt decryption.
    #[error("Invalid payload{}: {message}", format_context(.context))]
    InvalidPayload { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The encryptor or its builder is incorrectly configured.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
