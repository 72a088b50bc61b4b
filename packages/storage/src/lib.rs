//! Document storage.
//!
//! A small wrapper around `object_store` holding the corpus documents (PDF
//! originals and the like):
//! - on-disk storage for deployments and local dev
//! - in-memory storage for tests

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;

/// Default filesystem root for documents.
pub const DEFAULT_FS_ROOT: &str = "./data/documents";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendConfig {
    Filesystem { root: PathBuf },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all object keys.
    pub prefix: Option<String>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackendConfig::Memory,
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackendConfig::Filesystem { root: root.into() },
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = non_empty(prefix.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `STORAGE_BACKEND`: `filesystem` (default) or `memory`
    /// - `STORAGE_FS_ROOT` (default: `./data/documents`)
    /// - `STORAGE_PREFIX` (optional, e.g. `pdfs/`)
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let prefix = get("STORAGE_PREFIX");
        let fs_root = || {
            get("STORAGE_FS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FS_ROOT))
        };

        let cfg = match get("STORAGE_BACKEND").as_deref() {
            None | Some("filesystem") | Some("fs") => Self::filesystem(fs_root()),
            Some("memory") | Some("mem") => Self::memory(),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported STORAGE_BACKEND={other} (expected filesystem|memory)"
                )));
            }
        };

        Ok(Self { prefix, ..cfg })
    }
}

/// Handle to the document store. Cheap to clone.
#[derive(Clone)]
pub struct Storage {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Storage {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn kind_str(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn new(cfg: StorageConfig) -> Result<Self, StorageError> {
        let (kind, store) = match cfg.backend {
            StorageBackendConfig::Filesystem { root } => {
                ensure_dir(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as Arc<dyn ObjectStore>)
            }
            StorageBackendConfig::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as Arc<dyn ObjectStore>)
            }
        };

        tracing::debug!("Opened {} document storage", kind.as_str());

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(non_empty),
        })
    }

    pub fn from_env() -> Result<Self, StorageError> {
        Self::new(StorageConfig::from_env()?)
    }

    fn prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
    }

    fn to_path(&self, key: &str) -> Result<Path, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidKey(
                "object key must not be empty".to_string(),
            ));
        }
        if key.split('/').any(|part| part == ".." || part == ".") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let joined = match self.prefix() {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        };

        Path::parse(&joined).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store
            .put(&path, object_store::PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    /// Read a whole document. Missing keys yield `StorageError::NotFound`.
    pub async fn get_bytes(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.to_path(key)?;
        let res = match self.store.get(&path).await {
            Ok(res) => res,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(res.bytes().await?)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.to_path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store.delete(&path).await?;
        Ok(())
    }

    /// List keys under `prefix` (relative to the storage prefix), sorted.
    pub async fn list_names(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let sub = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty());
        let full = match (self.prefix(), sub) {
            (Some(base), Some(sub)) => Some(format!("{base}/{sub}")),
            (Some(base), None) => Some(base.to_string()),
            (None, Some(sub)) => Some(sub.to_string()),
            (None, None) => None,
        };
        let list_prefix = full
            .as_deref()
            .map(Path::parse)
            .transpose()
            .map_err(|e| StorageError::InvalidKey(e.to_string()))?;

        let metas: Vec<_> = self.store.list(list_prefix.as_ref()).try_collect().await?;

        let strip = self.prefix().map(|p| format!("{p}/"));
        let mut names: Vec<String> = metas
            .into_iter()
            .map(|meta| {
                let location = meta.location.to_string();
                match strip.as_deref() {
                    Some(strip) => location
                        .strip_prefix(strip)
                        .map(str::to_string)
                        .unwrap_or(location),
                    None => location,
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
