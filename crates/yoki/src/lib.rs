//! Facade crate for the Yoki save system.
//! Re-exports the archive, crypto, storage and save-manager crates under one roof.
//! Keep this crate thin: it composes other crates, it does not implement behavior.
//!
//! ## Usage
//! - Depend on `yoki` and on `yoki-archive` (the `#[save_module]` expansion names it).
//! - Build a [`SaveManager`](saves::SaveManager) and register modules through the [`prelude`].

pub use yoki_archive as archive;
pub use yoki_crypto as crypto;
pub use yoki_saves as saves;
pub use yoki_storage as storage;

pub mod prelude {
    pub use yoki_archive::prelude::*;
    pub use yoki_crypto::{AeadEncryptor, AesCbc, ChaCha, Encryptor};
    pub use yoki_saves::{
        AutoSaveHandle, AutoSaveOptions, BackgroundSave, SaveConfig, SaveError, SaveEvent,
        SaveEventKind, SaveManager, SaveOutcome,
    };
}
