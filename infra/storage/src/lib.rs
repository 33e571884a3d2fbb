//! A sandboxed, flat save directory.
//!
//! # Core Features
//!
//! - **Flat Sandbox**: Only single-component file names are accepted, so nothing can be read
//!   or written outside the configured directory.
//! - **Atomic Writes**: Unique temp write + `fsync` + `rename` + directory sync; a crash
//!   mid-save leaves the previous file intact.
//! - **Header Peeks**: [`Storage::read_prefix`] reads only the first bytes of a file.
//! - **Self-Healing**: Orphaned temp files are purged when the directory is opened.
//!
//! # Examples
//!
//! ```rust
//! use yoki_storage::{Storage, StorageError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("saves");
//!     let storage = Storage::builder().root(&root).create(true).connect().await?;
//!
//!     storage.write("save_1.yoki", b"important data").await?;
//!     assert_eq!(storage.read("save_1.yoki").await?, b"important data");
//!     assert_eq!(storage.list().await?, ["save_1.yoki"]);
//!
//!     storage.delete("save_1.yoki").await?;
//!     assert!(storage.read("save_1.yoki").await.is_err());
//!     Ok(())
//! }
//! ```

mod builder;
mod engine;
mod error;
mod maintenance;
mod security;

pub use builder::StorageBuilder;
pub use engine::{Storage, StorageInner};
pub use error::{StorageError, StorageErrorExt};
