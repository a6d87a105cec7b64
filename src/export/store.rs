//! Persistence boundary for recovered files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from the output store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create output directory {path}: {detail}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying error text.
        detail: String,
    },
    #[error("failed to write {name}: {detail}")]
    Write {
        /// Blob name being written.
        name: String,
        /// Underlying error text.
        detail: String,
    },
}

/// Destination for recovered, decompressed files.
pub trait OutputStore {
    /// Persists `data` under `name`.
    fn persist(&mut self, name: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// Writes recovered files into a directory.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::CreateDir {
            path: root.clone(),
            detail: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// The output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputStore for DirStore {
    fn persist(&mut self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        // strip any path components a hostile sender might have encoded
        let base = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recovered".to_string());
        let path = self.root.join(base);
        std::fs::write(&path, data).map_err(|e| StoreError::Write {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), bytes = data.len(), "file persisted");
        Ok(())
    }
}

/// In-memory store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a persisted blob by name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.blobs.get(name).map(Vec::as_slice)
    }

    /// Number of persisted blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Iterates over (name, size) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> {
        self.blobs.iter().map(|(name, data)| (name.as_str(), data.len()))
    }
}

impl OutputStore for MemoryStore {
    fn persist(&mut self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        self.blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }
}
