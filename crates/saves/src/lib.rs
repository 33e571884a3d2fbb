//! # Saves
//!
//! Slot-addressed, versioned and optionally encrypted saves.
//!
//! [`SaveManager`] is the entry point: it maps slots to files, stamps headers, migrates old
//! saves on load and runs saves in the background. It is assembled from:
//!
//! * [`yoki_archive`]: the archive, its file format and the migration chain.
//! * [`yoki_crypto`]: payload encryption.
//! * [`yoki_storage`]: atomic file replacement inside the save directory.
//!
//! ## Concurrency
//!
//! The manager is a cheap clone over shared state. Every operation snapshots the configuration
//! when it starts, so setters never affect work already running. At most one background save
//! per slot is in flight; further requests are skipped rather than queued.

mod autosave;
mod background;
mod builder;
mod config;
mod error;
mod events;
mod manager;

pub use autosave::{AutoSaveHandle, AutoSaveOptions};
pub use background::{BackgroundSave, SaveOutcome};
pub use builder::SaveManagerBuilder;
pub use config::{SaveConfig, load_config};
pub use error::{SaveError, SaveErrorExt};
pub use events::{SaveEvent, SaveEventKind};
pub use manager::{SaveManager, SaveManagerInner};
