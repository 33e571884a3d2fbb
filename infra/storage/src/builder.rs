use crate::engine::{Storage, StorageInner};
use crate::error::{StorageError, StorageErrorExt};
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::fs;
use tracing::info;

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug)]
pub struct StorageBuilder<S: Sealed = NoRoot> {
    state: S,
    create: bool,
}

impl Default for StorageBuilder<NoRoot> {
    fn default() -> Self {
        Self { state: NoRoot, create: true }
    }
}

#[allow(private_bounds)]
impl<S: Sealed> StorageBuilder<S> {
    #[must_use = "Sets whether the save directory should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.create = enable;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> StorageBuilder<N> {
        StorageBuilder { state, create: self.create }
    }
}

impl StorageBuilder<NoRoot> {
    #[must_use = "Creates a new storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the save directory for the storage engine"]
    pub fn root(self, path: impl Into<PathBuf>) -> StorageBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl StorageBuilder<WithRoot> {
    /// Consumes the configuration and opens the save directory.
    ///
    /// Creates the directory when `create(true)` is set (the default), canonicalizes it,
    /// and removes temp files orphaned by writers that crashed mid-save.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DirectoryNotFound`] when the directory is missing and
    /// `create(false)` was requested, and [`StorageError::Io`] when it cannot be created
    /// or resolved.
    pub async fn connect(self) -> Result<Storage, StorageError> {
        let root = &self.state.0;

        if self.create {
            fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap save directory: {}", root.display()))?;
            info!(path = %root.display(), "Bootstrapped save directory");
        } else if !fs::try_exists(root).await.unwrap_or(false) {
            return Err(StorageError::DirectoryNotFound {
                message: root.display().to_string().into(),
                context: Some("Save directory creation is disabled".into()),
            });
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve save directory: {}", root.display()))?;

        let storage = Storage {
            inner: Arc::new(StorageInner { root: canonical, tmp_counter: AtomicU64::new(1) }),
        };

        storage.purge_tmp().await;

        Ok(storage)
    }
}
