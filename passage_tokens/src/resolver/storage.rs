//! Durable key/value storage for fallback tokens

use std::{
    collections::HashMap,
    fmt, io,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use thiserror::Error;

/// Storage could not be read or written
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing medium failed
    #[error("unable to access storage")]
    Io(#[from] io::Error),
    /// The stored data could not be parsed
    #[error("storage contents are malformed")]
    Format(#[from] serde_json::Error),
}

/// A string key/value store that outlives a single session
#[async_trait]
pub trait DurableStorage: fmt::Debug + Send + Sync {
    /// Reads the value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes any value stored under `key`
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage held in process memory
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    /// Constructs an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn with_items<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> T {
        f(&mut self.items.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl DurableStorage for InMemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.with_items(|items| items.get(key).cloned()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_items(|items| items.insert(key.to_owned(), value.to_owned()));
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.with_items(|items| items.remove(key));
        Ok(())
    }
}

#[cfg(feature = "file")]
pub use file::FileStorage;

#[cfg(feature = "file")]
mod file {
    use std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    };

    use tokio::fs::OpenOptions;

    use super::*;

    /// Storage kept as a JSON object in a local file
    ///
    /// A missing or empty file reads as empty. On unix, the file is created
    /// readable only by its owner.
    #[derive(Debug)]
    pub struct FileStorage {
        path: PathBuf,
        write_lock: tokio::sync::Mutex<()>,
    }

    impl FileStorage {
        /// Constructs a store backed by the file at `path`
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self {
                path: path.into(),
                write_lock: tokio::sync::Mutex::new(()),
            }
        }

        /// The backing file
        pub fn path(&self) -> &Path {
            &self.path
        }

        async fn read_items(&self) -> Result<BTreeMap<String, String>, StorageError> {
            use tokio::io::AsyncReadExt;

            let mut file = match OpenOptions::new().read(true).open(&self.path).await {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
                Err(e) => return Err(e.into()),
            };

            let mut data = String::new();
            file.read_to_string(&mut data).await?;

            if data.trim().is_empty() {
                return Ok(BTreeMap::new());
            }

            Ok(serde_json::from_str(&data)?)
        }

        async fn write_items(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
            use tokio::io::AsyncWriteExt;

            let mut file_opts = OpenOptions::new();

            file_opts.create(true).truncate(true).write(true);

            #[cfg(unix)]
            file_opts.mode(0o600);

            let mut file = file_opts.open(&self.path).await?;
            let data = serde_json::to_string_pretty(items)?;
            file.write_all(data.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        }

        async fn update(
            &self,
            f: impl FnOnce(&mut BTreeMap<String, String>) -> bool + Send,
        ) -> Result<(), StorageError> {
            let _guard = self.write_lock.lock().await;
            let mut items = self.read_items().await?;
            if f(&mut items) {
                self.write_items(&items).await?;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DurableStorage for FileStorage {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.read_items().await?.remove(key))
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.update(|items| {
                items.insert(key.to_owned(), value.to_owned());
                true
            })
            .await
        }

        async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.update(|items| items.remove(key).is_some()).await
        }
    }
}
