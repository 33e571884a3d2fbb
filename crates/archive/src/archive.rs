use crate::error::{ArchiveError, ArchiveErrorExt};
use crate::format::{self, TableEntry};
use crate::module::{Module, ModuleKey};
use crate::serializer::{Postcard, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type AnyModule = dyn Any + Send + Sync;
type EncodeFn<S> = fn(&S, &AnyModule) -> Result<Vec<u8>, ArchiveError>;

/// A decoded module together with the monomorphized encoder for its concrete type.
struct Live<S> {
    value: Arc<AnyModule>,
    type_name: &'static str,
    encode: EncodeFn<S>,
}

impl<S: Serializer> Live<S> {
    fn new<T: Module>(value: Arc<T>) -> Self {
        Self { value, type_name: std::any::type_name::<T>(), encode: encode_live::<S, T> }
    }
}

impl<S> Clone for Live<S> {
    fn clone(&self) -> Self {
        Self { value: Arc::clone(&self.value), type_name: self.type_name, encode: self.encode }
    }
}

fn encode_live<S: Serializer, T: Module>(
    serializer: &S,
    value: &AnyModule,
) -> Result<Vec<u8>, ArchiveError> {
    let value = value.downcast_ref::<T>().ok_or_else(|| ArchiveError::Internal {
        message: "Live entry does not hold its registered type".into(),
        context: Some(std::any::type_name::<T>().into()),
    })?;
    serializer.serialize(value)
}

enum Entry<S> {
    /// Registered by the caller or decoded on demand.
    Live(Live<S>),
    /// Bytes read from disk, not decoded yet.
    Raw(Vec<u8>),
}

impl<S> Clone for Entry<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Live(live) => Self::Live(live.clone()),
            Self::Raw(bytes) => Self::Raw(bytes.clone()),
        }
    }
}

/// In-memory view of one save: a set of modules keyed by [`ModuleKey`].
///
/// Modules read from disk stay as raw bytes until first requested through
/// [`Archive::get_module`], which decodes them once and keeps the result. Modules that are
/// never requested are written back byte-for-byte on the next save, so an old build can
/// carry data owned by modules it does not know about.
///
/// Live modules are shared as `Arc<T>`. Cloning an archive is cheap and shares them.
///
/// ```rust
/// use yoki_archive::{Archive, Postcard, save_module};
///
/// #[save_module(tag = "player.stats")]
/// struct Stats {
///     level: u32,
/// }
///
/// # fn main() -> Result<(), yoki_archive::ArchiveError> {
/// let mut archive = Archive::<Postcard>::default();
/// archive.register_module(Stats { level: 7 });
///
/// let table = archive.serialize_all()?;
/// let mut restored = Archive::from_entries(archive.serializer(), table);
/// assert!(!restored.is_loaded::<Stats>());
/// assert_eq!(restored.get_module::<Stats>()?.map(|s| s.level), Some(7));
/// assert!(restored.is_loaded::<Stats>());
/// # Ok(())
/// # }
/// ```
pub struct Archive<S: Serializer = Postcard> {
    serializer: Arc<S>,
    entries: BTreeMap<ModuleKey, Entry<S>>,
}

impl<S: Serializer> Clone for Archive<S> {
    fn clone(&self) -> Self {
        Self { serializer: Arc::clone(&self.serializer), entries: self.entries.clone() }
    }
}

impl<S: Serializer + Default> Default for Archive<S> {
    fn default() -> Self {
        Self::new(Arc::new(S::default()))
    }
}

impl<S: Serializer> fmt::Debug for Archive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, entry) in &self.entries {
            match entry {
                Entry::Live(live) => map.entry(key, &live.type_name),
                Entry::Raw(bytes) => map.entry(key, &format_args!("raw({} bytes)", bytes.len())),
            };
        }
        map.finish()
    }
}

impl<S: Serializer> Archive<S> {
    /// An empty archive bound to `serializer`.
    #[must_use]
    pub const fn new(serializer: Arc<S>) -> Self {
        Self { serializer, entries: BTreeMap::new() }
    }

    /// Builds an archive of raw entries, as read from a module table.
    #[must_use]
    pub fn from_entries(serializer: Arc<S>, entries: Vec<TableEntry>) -> Self {
        let entries = entries.into_iter().map(|e| (e.key, Entry::Raw(e.data))).collect();
        Self { serializer, entries }
    }

    /// Decodes a module table into an archive of raw entries.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidFormat`] if the table is malformed.
    pub fn from_table_bytes(serializer: Arc<S>, bytes: &[u8]) -> Result<Self, ArchiveError> {
        Ok(Self::from_entries(serializer, format::decode_table(bytes)?))
    }

    /// The serializer used for every module of this archive.
    #[must_use]
    pub fn serializer(&self) -> Arc<S> {
        Arc::clone(&self.serializer)
    }

    /// Stores a module, replacing whatever was under its key. Nothing is serialized here.
    pub fn register_module<T: Module>(&mut self, value: T) {
        self.register_shared(Arc::new(value));
    }

    /// Stores an already shared module, replacing whatever was under its key.
    pub fn register_shared<T: Module>(&mut self, value: Arc<T>) {
        self.entries.insert(T::KEY, Entry::Live(Live::new(value)));
    }

    /// Returns the module of type `T`, decoding and memoizing it on first access.
    ///
    /// `Ok(None)` means the archive holds no such module; no default is fabricated.
    ///
    /// # Errors
    ///
    /// * [`ArchiveError::TypeMismatch`] if another registered type owns the same key.
    /// * [`ArchiveError::Serialization`] if the stored bytes do not decode as `T`. The raw
    ///   bytes are kept in that case.
    pub fn get_module<T: Module>(&mut self) -> Result<Option<Arc<T>>, ArchiveError> {
        let Some(entry) = self.entries.get_mut(&T::KEY) else {
            return Ok(None);
        };

        match entry {
            Entry::Live(live) => downcast::<T>(live).map(Some),
            Entry::Raw(bytes) => {
                let value: T = self
                    .serializer
                    .deserialize(bytes)
                    .context(format!("Decoding module `{}` ({})", T::TAG, T::KEY))?;
                debug!(tag = T::TAG, key = %T::KEY, bytes = bytes.len(), "Module decoded");

                let value = Arc::new(value);
                *entry = Entry::Live(Live::new(Arc::clone(&value)));
                Ok(Some(value))
            },
        }
    }

    /// Removes the module of type `T` and returns it by value.
    ///
    /// A live module still shared elsewhere is copied through the serializer.
    ///
    /// # Errors
    ///
    /// Same as [`Archive::get_module`]. The entry stays in place on error.
    pub fn take_module<T: Module>(&mut self) -> Result<Option<T>, ArchiveError> {
        let Some(entry) = self.entries.get(&T::KEY) else {
            return Ok(None);
        };

        let value = match entry {
            Entry::Live(live) => {
                let shared = downcast::<T>(live)?;
                match Arc::try_unwrap(shared) {
                    Ok(value) => value,
                    Err(shared) => {
                        let bytes = self.serializer.serialize(&*shared)?;
                        self.serializer.deserialize(&bytes)?
                    },
                }
            },
            Entry::Raw(bytes) => self
                .serializer
                .deserialize(bytes)
                .context(format!("Decoding module `{}` ({})", T::TAG, T::KEY))?,
        };

        self.entries.remove(&T::KEY);
        Ok(Some(value))
    }

    /// `true` if a module is stored under `T`'s key, decoded or not.
    #[must_use]
    pub fn has_module<T: Module>(&self) -> bool {
        self.entries.contains_key(&T::KEY)
    }

    /// `true` if `T`'s entry is present and already decoded.
    #[must_use]
    pub fn is_loaded<T: Module>(&self) -> bool {
        matches!(self.entries.get(&T::KEY), Some(Entry::Live(_)))
    }

    /// Drops `T`'s entry. Returns whether one was present.
    pub fn remove_module<T: Module>(&mut self) -> bool {
        self.entries.remove(&T::KEY).is_some()
    }

    #[must_use]
    pub fn contains_key(&self, key: ModuleKey) -> bool {
        self.entries.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys of every entry, ascending.
    pub fn keys(&self) -> impl Iterator<Item = ModuleKey> + '_ {
        self.entries.keys().copied()
    }

    /// Raw bytes of an entry that has not been decoded yet.
    #[must_use]
    pub fn raw_bytes(&self, key: ModuleKey) -> Option<&[u8]> {
        match self.entries.get(&key) {
            Some(Entry::Raw(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Stores raw bytes under `key`, replacing any entry there.
    pub fn insert_raw(&mut self, key: ModuleKey, bytes: Vec<u8>) {
        self.entries.insert(key, Entry::Raw(bytes));
    }

    /// Removes and returns an entry that has not been decoded yet. Live entries stay.
    pub fn remove_raw(&mut self, key: ModuleKey) -> Option<Vec<u8>> {
        match self.entries.get(&key) {
            Some(Entry::Raw(_)) => match self.entries.remove(&key) {
                Some(Entry::Raw(bytes)) => Some(bytes),
                _ => None,
            },
            _ => None,
        }
    }

    /// Rewrites the encoded bytes of every entry through `f`.
    ///
    /// Live entries are serialized first, so a value registered or decoded earlier is seen in
    /// the same form it would have on disk. Every entry comes out raw.
    ///
    /// All-or-nothing: if encoding or `f` fails for any entry, no entry is changed.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Serialization`] if a live module fails to encode, otherwise
    /// propagates the first error returned by `f`.
    pub fn map_encoded<F>(&mut self, mut f: F) -> Result<(), ArchiveError>
    where
        F: FnMut(ModuleKey, &[u8]) -> Result<Vec<u8>, ArchiveError>,
    {
        let mut rewritten = Vec::with_capacity(self.entries.len());
        for (key, entry) in &self.entries {
            let bytes = match entry {
                Entry::Live(live) => {
                    let encoded = (live.encode)(self.serializer.as_ref(), live.value.as_ref())
                        .context(format!("Encoding module `{}` ({key})", live.type_name))?;
                    f(*key, &encoded)?
                },
                Entry::Raw(bytes) => f(*key, bytes)?,
            };
            rewritten.push((*key, bytes));
        }
        for (key, bytes) in rewritten {
            self.entries.insert(key, Entry::Raw(bytes));
        }
        Ok(())
    }

    /// Produces the module table: live entries are serialized now, raw entries are passed
    /// through unchanged. Entries are ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Serialization`] if any live module fails to encode.
    pub fn serialize_all(&self) -> Result<Vec<TableEntry>, ArchiveError> {
        self.entries
            .iter()
            .map(|(key, entry)| -> Result<TableEntry, ArchiveError> {
                let data = match entry {
                    Entry::Live(live) => (live.encode)(self.serializer.as_ref(), live.value.as_ref())
                        .context(format!("Encoding module `{}` ({key})", live.type_name))?,
                    Entry::Raw(bytes) => bytes.clone(),
                };
                Ok(TableEntry { key: *key, data })
            })
            .collect()
    }

    /// [`Archive::serialize_all`] followed by [`format::encode_table`].
    ///
    /// # Errors
    ///
    /// See [`Archive::serialize_all`] and [`format::encode_table`].
    pub fn to_table_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        format::encode_table(&self.serialize_all()?)
    }
}

fn downcast<T: Module>(live: &Live<impl Serializer>) -> Result<Arc<T>, ArchiveError> {
    Arc::clone(&live.value).downcast::<T>().map_err(|_| ArchiveError::TypeMismatch {
        key: T::KEY,
        expected: std::any::type_name::<T>(),
        found: live.type_name,
        context: None,
    })
}
