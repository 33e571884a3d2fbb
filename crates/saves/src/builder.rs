use crate::config::SaveConfig;
use crate::error::{SaveError, SaveErrorExt};
use crate::manager::{EngineState, SaveManager};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use yoki_archive::{MigrationChain, Migrator, Postcard, Serializer};
use yoki_crypto::Encryptor;
use yoki_storage::Storage;

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A builder for [`SaveManager`].
///
/// Every setting has a default ([`SaveConfig::default`], no encryption, no migrators), so
/// `SaveManager::builder().connect().await` is a working manager saving into `./saves`.
pub struct SaveManagerBuilder<S: Serializer = Postcard> {
    serializer: S,
    encryptor: Option<Arc<dyn Encryptor>>,
    config: SaveConfig,
    migrators: Vec<Migrator<S>>,
    event_capacity: usize,
}

impl<S: Serializer> fmt::Debug for SaveManagerBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveManagerBuilder")
            .field("serializer", &self.serializer.name())
            .field("encryptor", &self.encryptor)
            .field("config", &self.config)
            .field("migrators", &self.migrators)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

impl Default for SaveManagerBuilder<Postcard> {
    fn default() -> Self {
        Self::with_serializer(Postcard)
    }
}

impl SaveManagerBuilder<Postcard> {
    #[must_use = "Creates a new save manager builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Serializer> SaveManagerBuilder<S> {
    #[must_use = "Creates a new save manager builder around the given serializer"]
    pub fn with_serializer(serializer: S) -> Self {
        Self {
            serializer,
            encryptor: None,
            config: SaveConfig::default(),
            migrators: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    #[must_use = "Replaces the serializer instance"]
    pub fn serializer(mut self, serializer: S) -> Self {
        self.serializer = serializer;
        self
    }

    #[must_use = "Encrypts every payload written by the manager"]
    pub fn encryptor(mut self, encryptor: impl Encryptor + 'static) -> Self {
        self.encryptor = Some(Arc::new(encryptor));
        self
    }

    #[must_use = "Sets or clears an already shared encryptor"]
    pub fn shared_encryptor(mut self, encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        self.encryptor = encryptor;
        self
    }

    /// Replaces the whole configuration, e.g. one from [`load_config`](crate::load_config).
    #[must_use = "Replaces the whole configuration"]
    pub fn config(mut self, config: SaveConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "Sets the directory holding the save files"]
    pub fn save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.save_path = path.into();
        self
    }

    #[must_use = "Sets the schema version stamped on new saves"]
    pub const fn current_version(mut self, version: i32) -> Self {
        self.config.current_version = version;
        self
    }

    #[must_use = "Sets the number of valid slots"]
    pub const fn max_slots(mut self, max_slots: i32) -> Self {
        self.config.max_slots = max_slots;
        self
    }

    #[must_use = "Sets the file name prefix and extension of slot files"]
    pub fn file_naming(mut self, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self.config.file_extension = extension.into();
        self
    }

    #[must_use = "Adds a migration step"]
    pub fn migrator(mut self, migrator: Migrator<S>) -> Self {
        self.migrators.push(migrator);
        self
    }

    /// Events buffered per subscriber before the slowest one starts lagging.
    #[must_use = "Sets the capacity of the save event channel"]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validates the configuration, registers the migrators and opens the save directory.
    ///
    /// The directory is created when missing; temp files left by interrupted saves are removed.
    ///
    /// # Errors
    ///
    /// [`SaveError::InvalidConfiguration`] for an invalid configuration or migrator set,
    /// [`SaveError::Io`] when the directory cannot be opened.
    pub async fn connect(self) -> Result<SaveManager<S>, SaveError> {
        self.config.validate()?;

        let mut migrations = MigrationChain::new();
        for migrator in self.migrators {
            migrations.register(migrator)?;
        }

        let storage = Storage::builder()
            .root(&self.config.save_path)
            .connect()
            .await
            .context("Opening save directory")?;

        info!(
            path = %storage.root().display(),
            version = self.config.current_version,
            max_slots = self.config.max_slots,
            serializer = self.serializer.name(),
            encrypted = self.encryptor.is_some(),
            migrators = migrations.len(),
            "Save manager ready"
        );

        let state = EngineState {
            serializer: Arc::new(self.serializer),
            encryptor: self.encryptor,
            storage,
            config: self.config,
            migrations: Arc::new(migrations),
        };
        Ok(SaveManager::from_state(state, self.event_capacity))
    }
}
