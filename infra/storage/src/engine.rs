//! The [`Storage`] handle: a flat directory of save files with atomic replacement.

use crate::builder::StorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::{maintenance, security};
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// The internal shared state of a [`Storage`] instance.
#[derive(Debug)]
pub struct StorageInner {
    /// The canonicalized physical directory holding every save file.
    pub(crate) root: PathBuf,
    /// A unique counter used to generate temporary file names.
    pub(crate) tmp_counter: AtomicU64,
}

/// A thread-safe handle to a save directory.
///
/// Every name passed in must be a single file-name component; the directory is flat.
/// Writes go through a unique temp file, `fsync` and `rename`, so readers only ever observe
/// the previous or the new content of a file. The handle is reference-counted and cheap
/// to clone.
///
/// # Example
///
/// ```rust
/// use yoki_storage::{Storage, StorageError};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("saves");
///     let storage = Storage::builder().root(&root).connect().await?;
///
///     storage.write("save_0.yoki", b"YOKI...").await?;
///     assert_eq!(storage.read_prefix("save_0.yoki", 4).await?, b"YOKI");
///     assert_eq!(storage.list().await?, vec!["save_0.yoki".to_owned()]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Deref for Storage {
    type Target = StorageInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// The canonical save directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a file name to its physical path inside the save directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidFileName`] unless `name` is a single normal component.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        security::resolve(&self.root, name)
    }

    /// Reads a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if the file does not exist.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let resolved = self.resolve(name)?;

        match fs::read(&resolved).await {
            Ok(data) => Ok(data),
            Err(err) => Err(io_failure(err, &resolved, "Read failed")),
        }
    }

    /// Reads at most `len` bytes from the start of a file.
    ///
    /// Used to inspect headers without loading whole payloads. A shorter file yields a
    /// shorter buffer rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if the file does not exist.
    pub async fn read_prefix(&self, name: &str, len: usize) -> Result<Vec<u8>, StorageError> {
        let resolved = self.resolve(name)?;

        let file = match fs::File::open(&resolved).await {
            Ok(file) => file,
            Err(err) => return Err(io_failure(err, &resolved, "Open failed")),
        };

        let mut buf = Vec::with_capacity(len.min(64 * 1024));
        file.take(len as u64)
            .read_to_end(&mut buf)
            .await
            .context(format!("Prefix read failed: {}", resolved.display()))?;
        Ok(buf)
    }

    /// Replaces a file atomically.
    ///
    /// 1. Data is written to a unique temporary file (`<name>.yokitmp.<id>`).
    /// 2. The file is synced to hardware (`fsync`).
    /// 3. The temporary file is renamed over the destination.
    /// 4. The directory is synced so the rename itself is durable.
    ///
    /// On platforms that refuse to rename over an existing target, the old file is
    /// removed first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the disk is full or a hardware failure occurs.
    /// The temp file is removed on failure.
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let resolved = self.resolve(name)?;
        let temp = unique_tmp_path(&resolved, &self.tmp_counter);

        if let Err(err) = Self::write_temp(&temp, data).await {
            Self::discard(&temp).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&temp, &resolved).await {
            let swapped = if err.kind() == ErrorKind::AlreadyExists {
                match fs::remove_file(&resolved).await {
                    Ok(()) => fs::rename(&temp, &resolved).await,
                    Err(remove_err) => Err(remove_err),
                }
            } else {
                Err(err)
            };

            if let Err(err) = swapped {
                Self::discard(&temp).await;
                return Err(StorageError::Io {
                    source: err,
                    context: Some(
                        format!("Atomic swap failed: {} -> {}", temp.display(), resolved.display())
                            .into(),
                    ),
                });
            }
        }

        Self::sync_dir(&self.root).await;

        debug!(path = %resolved.display(), bytes = data.len(), "File saved atomically");
        Ok(())
    }

    async fn write_temp(temp: &Path, data: &[u8]) -> Result<(), StorageError> {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(temp)
            .await
            .context(format!("Temp creation failed: {}", temp.display()))?;
        file.write_all(data).await.context("Write failed")?;
        file.sync_all().await.context("Hardware sync failed")?;
        Ok(())
    }

    async fn discard(temp: &Path) {
        if let Err(err) = fs::remove_file(temp).await
            && err.kind() != ErrorKind::NotFound
        {
            warn!(path = %temp.display(), error = %err, "Failed to remove temp file");
        }
    }

    /// Deletes a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileNotFound`] if the file does not exist.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let resolved = self.resolve(name)?;
        if let Err(err) = fs::remove_file(&resolved).await {
            return Err(io_failure(err, &resolved, "Failed to delete"));
        }
        Self::sync_dir(&self.root).await;
        debug!(path = %resolved.display(), "File deleted");
        Ok(())
    }

    /// Lists the names of regular files in the directory, sorted, without temp files.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DirectoryNotFound`] if the directory vanished.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::DirectoryNotFound {
                    message: self.root.display().to_string().into(),
                    context: None,
                });
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to list: {}", self.root.display()).into()),
                });
            },
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Directory iteration failed")? {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !maintenance::is_tmp_name(&name) {
                names.push(name);
            }
        }

        names.sort_unstable();
        Ok(names)
    }

    /// Removes temp files older than five minutes. Returns how many were removed.
    pub async fn purge_tmp(&self) -> usize {
        maintenance::purge_tmp(&self.root, None).await
    }

    /// Removes temp files at least `age` old. Returns how many were removed.
    pub async fn purge_tmp_older_than(&self, age: Duration) -> usize {
        maintenance::purge_tmp(&self.root, Some(age)).await
    }

    async fn sync_dir(path: &Path) {
        match fs::File::open(path).await {
            Ok(dir) => {
                if let Err(err) = dir.sync_all().await {
                    debug!(path = %path.display(), error = %err, "Directory sync failed");
                }
            },
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Directory open failed");
            },
        }
    }
}

fn io_failure(err: std::io::Error, path: &Path, what: &'static str) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::FileNotFound { message: path.display().to_string().into(), context: None }
    } else {
        StorageError::Io { source: err, context: Some(format!("{what}: {}", path.display()).into()) }
    }
}

fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("save");
    target.with_file_name(format!("{file_name}{}{}-{counter}", security::TMP_MARKER, std::process::id()))
}
