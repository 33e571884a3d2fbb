//! The [`SaveManager`] handle: slot-addressed saves on top of storage, archive and crypto.

use crate::background::InFlight;
use crate::builder::SaveManagerBuilder;
use crate::config::SaveConfig;
use crate::error::{SaveError, SaveErrorExt};
use crate::events::SaveEvent;
use chrono::Utc;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use yoki_archive::format::{self, FIXED_HEADER_LEN};
use yoki_archive::{
    Archive, ArchiveErrorExt, ArchiveHeader, MigrationChain, Migrator, Postcard, Serializer,
};
use yoki_crypto::{CryptoError, Encryptor};
use yoki_storage::Storage;

/// Everything an operation needs, captured at its start.
///
/// Setters swap fields under the lock; operations already running keep the snapshot they took.
pub(crate) struct EngineState<S: Serializer> {
    pub(crate) serializer: Arc<S>,
    pub(crate) encryptor: Option<Arc<dyn Encryptor>>,
    pub(crate) storage: Storage,
    pub(crate) config: SaveConfig,
    pub(crate) migrations: Arc<MigrationChain<S>>,
}

impl<S: Serializer> Clone for EngineState<S> {
    fn clone(&self) -> Self {
        Self {
            serializer: Arc::clone(&self.serializer),
            encryptor: self.encryptor.clone(),
            storage: self.storage.clone(),
            config: self.config.clone(),
            migrations: Arc::clone(&self.migrations),
        }
    }
}

impl<S: Serializer> EngineState<S> {
    /// Serializes, encrypts and atomically writes `archive` into `slot`.
    pub(crate) async fn write_archive(
        &self,
        slot: i32,
        archive: &Archive<S>,
        display_name: Option<&str>,
    ) -> Result<ArchiveHeader, SaveError> {
        self.config.check_slot(slot)?;
        let file_name = self.config.file_name(slot);
        let now = Utc::now().timestamp();

        let header = match self.read_header(&file_name).await {
            Some(mut previous) => {
                previous.schema_version = self.config.current_version;
                previous.slot_id = slot;
                previous.last_saved_at = now;
                if let Some(name) = display_name {
                    name.clone_into(&mut previous.display_name);
                }
                previous
            },
            None => ArchiveHeader::new(
                slot,
                self.config.current_version,
                now,
                display_name.unwrap_or_default(),
            ),
        };
        let mut bytes = format::encode_header(&header)?;

        let table = archive.to_table_bytes().context(format!("Serializing slot {slot}"))?;
        match &self.encryptor {
            Some(encryptor) => {
                let sealed = encryptor.encrypt(&table).map_err(|err| {
                    SaveError::EncryptionFailed {
                        message: err.to_string().into(),
                        context: Some(format!("Saving slot {slot}").into()),
                    }
                })?;
                bytes.extend_from_slice(&sealed);
            },
            None => bytes.extend_from_slice(&table),
        }

        self.storage.write(&file_name, &bytes).await.context(format!("Saving slot {slot}"))?;

        debug!(
            slot,
            modules = archive.len(),
            bytes = bytes.len(),
            version = header.schema_version,
            encrypted = self.encryptor.is_some(),
            "Slot saved"
        );
        Ok(header)
    }

    /// Reads, decrypts and decodes `slot`, migrating and re-saving older files.
    pub(crate) async fn read_archive(&self, slot: i32) -> Result<Option<Archive<S>>, SaveError> {
        self.config.check_slot(slot)?;
        let file_name = self.config.file_name(slot);

        let bytes = match self.storage.read(&file_name).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(source) => {
                return Err(SaveError::Io {
                    source,
                    context: Some(format!("Loading slot {slot}").into()),
                });
            },
        };

        let (header, consumed) = match format::decode_header(&bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                debug!(slot, error = %err, "Ignoring file without a valid header");
                return Ok(None);
            },
        };

        let current = self.config.current_version;
        if header.schema_version > current {
            return Err(SaveError::UnsupportedVersion {
                found: header.schema_version,
                current,
                context: Some(format!("Loading slot {slot}").into()),
            });
        }

        let payload = bytes.get(consumed..).unwrap_or_default();
        let table: Cow<'_, [u8]> = match &self.encryptor {
            Some(encryptor) => {
                Cow::Owned(encryptor.decrypt(payload).context(format!("Loading slot {slot}"))?)
            },
            None => Cow::Borrowed(payload),
        };

        // Unauthenticated ciphers can accept a wrong key; the table is the first thing to notice.
        let mut archive = match Archive::from_table_bytes(Arc::clone(&self.serializer), &table) {
            Ok(archive) => archive,
            Err(err) if self.encryptor.is_some() => {
                return Err(SaveError::DecryptionFailed {
                    source: CryptoError::Decryption {
                        message: format!("Decrypted payload is not a module table: {err}").into(),
                        context: None,
                    },
                    context: Some(format!("Loading slot {slot}").into()),
                });
            },
            Err(err) => Err(err).context(format!("Loading slot {slot}"))?,
        };

        if header.schema_version < current {
            let steps = self.migrations.migrate(&mut archive, header.schema_version, current)?;
            self.write_archive(slot, &archive, None).await?;
            info!(slot, from = header.schema_version, to = current, steps, "Save migrated");
        }

        debug!(slot, modules = archive.len(), version = header.schema_version, "Slot loaded");
        Ok(Some(archive))
    }

    /// Reads only the header bytes of `file_name`. Any failure reads as "no valid save".
    /// Every in-range slot file whose header validates, ordered by slot.
    async fn scan(&self) -> Result<Vec<(i32, ArchiveHeader)>, SaveError> {
        let names = self.storage.list().await.context("Listing save slots")?;

        let mut slots: Vec<i32> = names
            .iter()
            .filter_map(|name| self.config.parse_slot(name))
            .filter(|slot| self.config.contains_slot(*slot))
            .collect();
        slots.sort_unstable();

        let mut saves = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(header) = self.read_header(&self.config.file_name(slot)).await {
                saves.push((slot, header));
            }
        }
        Ok(saves)
    }

    pub(crate) async fn read_header(&self, file_name: &str) -> Option<ArchiveHeader> {
        let prefix = self.storage.read_prefix(file_name, FIXED_HEADER_LEN).await.ok()?;
        let total = match format::declared_header_len(&prefix) {
            Ok(total) => total,
            Err(err) => {
                debug!(file = file_name, error = %err, "Header prefix rejected");
                return None;
            },
        };

        let bytes = if total > prefix.len() {
            self.storage.read_prefix(file_name, total).await.ok()?
        } else {
            prefix
        };

        match format::decode_header(&bytes) {
            Ok((header, _)) => Some(header),
            Err(err) => {
                debug!(file = file_name, error = %err, "Header rejected");
                None
            },
        }
    }
}

/// The shared state behind every [`SaveManager`] clone.
pub struct SaveManagerInner<S: Serializer> {
    pub(crate) state: RwLock<EngineState<S>>,
    pub(crate) in_flight: InFlight,
    pub(crate) events: broadcast::Sender<SaveEvent>,
}

impl<S: Serializer> fmt::Debug for SaveManagerInner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SaveManagerInner")
            .field("root", &state.storage.root())
            .field("config", &state.config)
            .field("serializer", &state.serializer.name())
            .field("encryptor", &state.encryptor.as_ref().map(|e| e.algorithm()))
            .field("migrations", &state.migrations.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// A thread-safe handle to a directory of save slots.
///
/// Each slot maps to one file (`save_<n>.yoki` by default) holding a plain header followed by
/// the module table, encrypted when an [`Encryptor`] is configured. The handle is
/// reference-counted and cheap to clone; configuration changes made through one clone are
/// seen by all of them.
///
/// Awaited [`save`](Self::save) and [`load`](Self::load) calls are not ordered against
/// background saves of the same slot; callers that mix them must coordinate themselves.
///
/// # Example
///
/// ```rust
/// use yoki_archive::{Postcard, save_module};
/// use yoki_saves::{SaveError, SaveManager};
///
/// #[save_module(tag = "player.stats")]
/// struct Stats {
///     level: u32,
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), SaveError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     let saves = SaveManager::builder().save_path(tmp.path()).connect().await?;
///
///     let mut archive = saves.archive();
///     archive.register_module(Stats { level: 7 });
///     saves.save(0, &archive, Some("Chapter 1")).await?;
///
///     assert!(saves.exists(0).await);
///     let mut loaded = saves.load(0).await?.expect("slot 0 was just written");
///     assert_eq!(loaded.get_module::<Stats>()?.map(|s| s.level), Some(7));
///     Ok(())
/// }
/// ```
pub struct SaveManager<S: Serializer = Postcard> {
    pub(crate) inner: Arc<SaveManagerInner<S>>,
}

impl<S: Serializer> Clone for SaveManager<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: Serializer> fmt::Debug for SaveManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveManager").field("inner", &self.inner).finish()
    }
}

impl<S: Serializer> Deref for SaveManager<S> {
    type Target = SaveManagerInner<S>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl SaveManager<Postcard> {
    #[must_use = "The save manager is not initialized until you call .connect()"]
    pub fn builder() -> SaveManagerBuilder<Postcard> {
        SaveManagerBuilder::new()
    }
}

impl<S: Serializer> SaveManager<S> {
    /// A builder for a manager using a serializer other than [`Postcard`].
    #[must_use = "The save manager is not initialized until you call .connect()"]
    pub fn builder_with(serializer: S) -> SaveManagerBuilder<S> {
        SaveManagerBuilder::with_serializer(serializer)
    }

    pub(crate) fn from_state(state: EngineState<S>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(SaveManagerInner {
                state: RwLock::new(state),
                in_flight: InFlight::default(),
                events,
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> EngineState<S> {
        self.state.read().clone()
    }

    pub(crate) fn emit(&self, event: SaveEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// An empty archive bound to the current serializer.
    #[must_use]
    pub fn archive(&self) -> Archive<S> {
        Archive::new(Arc::clone(&self.state.read().serializer))
    }

    /// Writes `archive` into `slot`, replacing the previous file atomically.
    ///
    /// An existing valid header keeps its `created_at` and, when `display_name` is `None`,
    /// its name. The returned header is what now sits on disk.
    ///
    /// # Errors
    ///
    /// [`SaveError::SlotOutOfRange`], [`SaveError::Serialization`],
    /// [`SaveError::EncryptionFailed`] or [`SaveError::Io`]. On error the old file is intact.
    pub async fn save(
        &self,
        slot: i32,
        archive: &Archive<S>,
        display_name: Option<&str>,
    ) -> Result<ArchiveHeader, SaveError> {
        self.snapshot().write_archive(slot, archive, display_name).await
    }

    /// Loads `slot`.
    ///
    /// Returns `Ok(None)` when the file is missing or its header is not valid. Files from an
    /// older schema are migrated and written back before the archive is returned.
    ///
    /// # Errors
    ///
    /// * [`SaveError::DecryptionFailed`]: wrong key or tampered payload.
    /// * [`SaveError::InvalidFormat`]: the module table is malformed.
    /// * [`SaveError::UnsupportedVersion`]: the file comes from a newer schema.
    /// * [`SaveError::MigrationUnreachable`]: a migrator is missing; the file is untouched.
    pub async fn load(&self, slot: i32) -> Result<Option<Archive<S>>, SaveError> {
        self.snapshot().read_archive(slot).await
    }

    /// The header of `slot`, read without touching the payload. Never fails.
    pub async fn get_meta(&self, slot: i32) -> Option<ArchiveHeader> {
        let state = self.snapshot();
        if !state.config.contains_slot(slot) {
            return None;
        }
        state.read_header(&state.config.file_name(slot)).await
    }

    /// `true` when `slot` holds a file with a valid header.
    pub async fn exists(&self, slot: i32) -> bool {
        self.get_meta(slot).await.is_some()
    }

    /// Removes the file of `slot`. Returns `false` when there was nothing to remove.
    pub async fn delete(&self, slot: i32) -> Result<bool, SaveError> {
        let state = self.snapshot();
        state.config.check_slot(slot)?;

        match state.storage.delete(&state.config.file_name(slot)).await {
            Ok(()) => {
                debug!(slot, "Slot deleted");
                Ok(true)
            },
            Err(err) if err.is_not_found() => Ok(false),
            Err(source) => Err(SaveError::Io {
                source,
                context: Some(format!("Deleting slot {slot}").into()),
            }),
        }
    }

    /// Slots holding a save with a valid header, ascending.
    ///
    /// Files that match the naming scheme but fail header validation are left out.
    pub async fn get_all_slots(&self) -> Result<Vec<i32>, SaveError> {
        let saves = self.snapshot().scan().await?;
        Ok(saves.into_iter().map(|(slot, _)| slot).collect())
    }

    /// Headers of every slot with a valid save, ordered by slot.
    pub async fn scan_all_saves(&self) -> Result<Vec<ArchiveHeader>, SaveError> {
        let saves = self.snapshot().scan().await?;
        Ok(saves.into_iter().map(|(_, header)| header).collect())
    }

    /// Duplicates the save in `from` into `to`, rewriting only the slot id of the header.
    ///
    /// The payload is copied as is, so no key is needed.
    ///
    /// # Errors
    ///
    /// [`SaveError::NotFound`] when `from` is empty, [`SaveError::InvalidFormat`] when its
    /// header is not valid.
    pub async fn copy_slot(&self, from: i32, to: i32) -> Result<ArchiveHeader, SaveError> {
        let state = self.snapshot();
        state.config.check_slot(from)?;
        state.config.check_slot(to)?;

        let bytes = match state.storage.read(&state.config.file_name(from)).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => {
                return Err(SaveError::NotFound { slot: from, context: Some("Copying slot".into()) });
            },
            Err(source) => {
                return Err(SaveError::Io {
                    source,
                    context: Some(format!("Copying slot {from}").into()),
                });
            },
        };

        let (mut header, consumed) =
            format::decode_header(&bytes).context(format!("Copying slot {from}"))?;
        header.slot_id = to;

        let mut copy = format::encode_header(&header)?;
        copy.extend_from_slice(bytes.get(consumed..).unwrap_or_default());
        state
            .storage
            .write(&state.config.file_name(to), &copy)
            .await
            .context(format!("Copying slot {from} into {to}"))?;

        debug!(from, to, "Slot copied");
        Ok(header)
    }

    /// A snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> SaveConfig {
        self.state.read().config.clone()
    }

    /// The canonical save directory.
    #[must_use]
    pub fn save_path(&self) -> PathBuf {
        self.state.read().storage.root().to_path_buf()
    }

    #[must_use]
    pub fn encryptor(&self) -> Option<Arc<dyn Encryptor>> {
        self.state.read().encryptor.clone()
    }

    /// Receives an event for every background and auto-save outcome.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.events.subscribe()
    }

    /// `true` while a background save of `slot` is running.
    #[must_use]
    pub fn is_saving(&self, slot: i32) -> bool {
        self.in_flight.contains(slot)
    }

    /// Replaces the serializer used by new archives and by loads.
    ///
    /// Existing files are not re-encoded; they must still decode with the new instance.
    pub fn set_serializer(&self, serializer: S) {
        self.state.write().serializer = Arc::new(serializer);
    }

    /// Sets or clears (`None`) the encryptor. Existing files are not re-encrypted.
    pub fn set_encryptor(&self, encryptor: Option<Arc<dyn Encryptor>>) {
        info!(
            algorithm = encryptor.as_ref().map(|e| e.algorithm()),
            "Save encryption changed"
        );
        self.state.write().encryptor = encryptor;
    }

    /// Moves the manager to another directory, creating it if needed.
    pub async fn set_save_path(&self, path: impl Into<PathBuf>) -> Result<(), SaveError> {
        let path = path.into();
        let storage = Storage::builder()
            .root(&path)
            .connect()
            .await
            .context(format!("Opening save directory {}", path.display()))?;

        info!(path = %storage.root().display(), "Save directory changed");
        let mut state = self.state.write();
        state.storage = storage;
        state.config.save_path = path;
        Ok(())
    }

    pub fn set_current_version(&self, version: i32) -> Result<(), SaveError> {
        self.update_config(|config| config.current_version = version)
    }

    pub fn set_max_slots(&self, max_slots: i32) -> Result<(), SaveError> {
        self.update_config(|config| config.max_slots = max_slots)
    }

    /// Changes how slots map to file names. Files under the old naming become invisible.
    pub fn set_file_naming(
        &self,
        prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Result<(), SaveError> {
        let (prefix, extension) = (prefix.into(), extension.into());
        self.update_config(move |config| {
            config.file_prefix = prefix;
            config.file_extension = extension;
        })
    }

    /// Adds a migration step.
    ///
    /// # Errors
    ///
    /// [`SaveError::InvalidConfiguration`] when the step does not move forward or another
    /// step already starts at the same version.
    pub fn register_migrator(&self, migrator: Migrator<S>) -> Result<(), SaveError> {
        let (from, to) = (migrator.from(), migrator.to());
        let mut state = self.state.write();
        Arc::make_mut(&mut state.migrations).register(migrator)?;
        debug!(from, to, "Migrator registered");
        Ok(())
    }

    /// Applies `change` to a copy of the configuration and keeps it only if it validates.
    fn update_config(&self, change: impl FnOnce(&mut SaveConfig)) -> Result<(), SaveError> {
        let mut state = self.state.write();
        let mut config = state.config.clone();
        change(&mut config);
        config.validate()?;
        state.config = config;
        Ok(())
    }
}
