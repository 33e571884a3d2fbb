//! # Archive Errors
//!
//! [`ArchiveError`] covers malformed files, serializer failures and migration planning.

use crate::module::ModuleKey;
use std::borrow::Cow;

/// Type-erased error produced by a [`Serializer`](crate::Serializer) backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[yoki_derive::yoki_error]
pub enum ArchiveError {
    /// The bytes are not a well-formed header or module table.
    #[error("Invalid format{}: {message}", format_context(.context))]
    InvalidFormat { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A serializer backend failed to encode or decode a module.
    #[error("Serialization error{}: {source}", format_context(.context))]
    Serialization { source: BoxError, context: Option<Cow<'static, str>> },

    /// A module key is held by a different Rust type than the one requested.
    #[error("Module {key} holds `{found}`, not `{expected}`{}", format_context(.context))]
    TypeMismatch {
        key: ModuleKey,
        expected: &'static str,
        found: &'static str,
        context: Option<Cow<'static, str>>,
    },

    /// No chain of migrators leads from the stored version to the target version.
    #[error(
        "No migration path from v{from} to v{to} (stuck at v{frontier}){}",
        format_context(.context)
    )]
    MigrationUnreachable { from: i32, to: i32, frontier: i32, context: Option<Cow<'static, str>> },

    /// A migrator for this source version is already registered.
    #[error("Migrator from v{from} is already registered{}", format_context(.context))]
    DuplicateMigrator { from: i32, context: Option<Cow<'static, str>> },

    /// A migrator must move strictly forward.
    #[error("Migrator v{from} -> v{to} does not move forward{}", format_context(.context))]
    InvalidMigrator { from: i32, to: i32, context: Option<Cow<'static, str>> },

    /// A migration step failed while transforming the archive.
    #[error("Migration v{from} -> v{to} failed{}: {source}", format_context(.context))]
    Migration {
        from: i32,
        to: i32,
        source: Box<ArchiveError>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal archive error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ArchiveError {
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidFormat { message: message.into(), context: None }
    }

    pub(crate) fn serialization(
        source: impl std::error::Error + Send + Sync + 'static,
        context: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Serialization { source: Box::new(source), context: Some(context.into()) }
    }
}
