//! The in-memory and on-disk model of a save.
//!
//! * [`format`]: header and module-table codecs.
//! * [`Module`] / [`ModuleKey`]: persisted types and their stable identifiers.
//! * [`Serializer`]: per-module encoding ([`Postcard`] by default, [`Json`] for debugging).
//! * [`Archive`]: modules of one save, decoded lazily.
//! * [`migration`]: forward-only schema migrations.
//!
//! ## Example
//!
//! ```rust
//! use yoki_archive::prelude::*;
//!
//! #[save_module(tag = "world.clock")]
//! struct Clock {
//!     day: u32,
//! }
//!
//! # fn main() -> Result<(), ArchiveError> {
//! let mut archive = Archive::<Postcard>::default();
//! archive.register_module(Clock { day: 3 });
//!
//! let bytes = archive.to_table_bytes()?;
//! let mut restored = Archive::from_table_bytes(archive.serializer(), &bytes)?;
//! assert_eq!(restored.get_module::<Clock>()?.as_deref(), Some(&Clock { day: 3 }));
//! # Ok(())
//! # }
//! ```

#[allow(unused_extern_crates)]
extern crate self as yoki_archive;

mod archive;
mod error;
pub mod format;
pub mod migration;
mod module;
mod serializer;

pub use archive::Archive;
pub use error::{ArchiveError, ArchiveErrorExt, BoxError};
pub use format::{ArchiveHeader, TableEntry};
pub use migration::{MigrationChain, Migrator};
pub use module::{Module, ModuleKey};
pub use serde;
pub use serializer::{Json, Postcard, Serializer};
pub use yoki_derive::save_module;

pub mod prelude {
    pub use crate::archive::Archive;
    pub use crate::error::{ArchiveError, ArchiveErrorExt};
    pub use crate::format::ArchiveHeader;
    pub use crate::migration::{MigrationChain, Migrator};
    pub use crate::module::{Module, ModuleKey};
    pub use crate::serializer::{Json, Postcard, Serializer};
    pub use yoki_derive::save_module;
}
