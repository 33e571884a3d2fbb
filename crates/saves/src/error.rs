//! # Save Errors
//!
//! [`SaveError`] is the taxonomy callers of the save manager match on. Lower-level errors
//! from the archive, crypto and storage crates are folded into it.

use std::borrow::Cow;
use yoki_archive::{ArchiveError, BoxError};
use yoki_crypto::CryptoError;
use yoki_storage::StorageError;

#[yoki_derive::yoki_error]
pub enum SaveError {
    /// The slot holds no save file.
    #[error("Slot {slot} has no save{}", format_context(.context))]
    NotFound { slot: i32, context: Option<Cow<'static, str>> },

    /// The file or its module table is malformed.
    #[error("Invalid save format{}: {message}", format_context(.context))]
    InvalidFormat { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The payload could not be decrypted: wrong key, or tampered data.
    #[error("Decryption failed{}: {source}", format_context(.context))]
    DecryptionFailed { source: CryptoError, context: Option<Cow<'static, str>> },

    #[error("Encryption failed{}: {message}", format_context(.context))]
    EncryptionFailed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The stored schema version cannot be brought up to the current one.
    #[error(
        "No migration path from v{from} to v{to} (stuck at v{frontier}){}",
        format_context(.context)
    )]
    MigrationUnreachable { from: i32, to: i32, frontier: i32, context: Option<Cow<'static, str>> },

    /// A migration step failed while transforming a loaded archive.
    #[error("Migration v{from} -> v{to} failed{}: {message}", format_context(.context))]
    MigrationFailed {
        from: i32,
        to: i32,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// The file was written by a newer schema than this build knows.
    #[error("Save uses schema v{found}, newest supported is v{current}{}", format_context(.context))]
    UnsupportedVersion { found: i32, current: i32, context: Option<Cow<'static, str>> },

    #[error("Serialization failed{}: {source}", format_context(.context))]
    Serialization { source: BoxError, context: Option<Cow<'static, str>> },

    #[error("Storage failure{}: {source}", format_context(.context))]
    Io { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Slot {slot} is outside 0..{max_slots}{}", format_context(.context))]
    SlotOutOfRange { slot: i32, max_slots: i32, context: Option<Cow<'static, str>> },

    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Configuration source error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Internal save error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<ArchiveError> for SaveError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::InvalidFormat { message, context } => {
                Self::InvalidFormat { message, context }
            },
            ArchiveError::Serialization { source, context } => {
                Self::Serialization { source, context }
            },
            ArchiveError::MigrationUnreachable { from, to, frontier, context } => {
                Self::MigrationUnreachable { from, to, frontier, context }
            },
            ArchiveError::Migration { from, to, source, context } => {
                Self::MigrationFailed { from, to, message: source.to_string().into(), context }
            },
            err @ (ArchiveError::DuplicateMigrator { .. } | ArchiveError::InvalidMigrator { .. }) => {
                Self::InvalidConfiguration { message: err.to_string().into(), context: None }
            },
            err @ ArchiveError::TypeMismatch { .. } => {
                Self::Serialization { source: Box::new(err), context: None }
            },
            ArchiveError::Internal { message, context } => Self::Internal { message, context },
        }
    }
}

impl SaveError {
    pub(crate) fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfiguration { message: message.into(), context: None }
    }
}
