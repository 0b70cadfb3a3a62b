//! Persistence adapter: a path -> string store plus cached blob files.
//!
//! Scalars are always stored as text. The typed helpers below own the
//! encoding (shortest round-trip decimal for floats, decimal for integers) so every caller
//! round-trips identically regardless of the backing store.
//!
//! Two stores ship here: `FileStore` (scalars under `<base>/data/<key>.txt`,
//! blobs under `<base>/<rel_path>`) and `MemoryStore`, whose clones share
//! one map so a test can hand a copy to a worker and inspect it afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no value stored at '{0}'")]
    NotFound(String),
    #[error("invalid storage path '{0}'")]
    InvalidPath(String),
    #[error("value '{value}' at '{path}' is not a valid {expected}")]
    Parse {
        path: String,
        value: String,
        expected: &'static str,
    },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait Storage: Send {
    /// Store a scalar value under `path` (e.g. `player/level`).
    fn save(&mut self, path: &str, value: &str) -> Result<(), StorageError>;

    fn load(&self, path: &str) -> Result<String, StorageError>;

    /// Write a cached file (e.g. `worlds/town/town_json_data.json`).
    fn write_file(&mut self, rel_path: &str, contents: &str) -> Result<(), StorageError>;

    fn read_file(&self, rel_path: &str) -> Result<String, StorageError>;

    fn file_exists(&self, rel_path: &str) -> bool;

    /// Host filesystem location of a cached file, when the store has one.
    /// Transports use this to stream large bodies straight to disk.
    fn file_path(&self, _rel_path: &str) -> Option<PathBuf> {
        None
    }
}

fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn scalar_path(&self, key: &str) -> PathBuf {
        self.base.join("data").join(format!("{key}.txt"))
    }

    fn write(path: &Path, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read(path: &Path, key: &str) -> Result<String, StorageError> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl Storage for FileStore {
    fn save(&mut self, path: &str, value: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        Self::write(&self.scalar_path(path), value)
    }

    fn load(&self, path: &str) -> Result<String, StorageError> {
        validate_path(path)?;
        Self::read(&self.scalar_path(path), path)
    }

    fn write_file(&mut self, rel_path: &str, contents: &str) -> Result<(), StorageError> {
        validate_path(rel_path)?;
        Self::write(&self.base.join(rel_path), contents)
    }

    fn read_file(&self, rel_path: &str) -> Result<String, StorageError> {
        validate_path(rel_path)?;
        Self::read(&self.base.join(rel_path), rel_path)
    }

    fn file_exists(&self, rel_path: &str) -> bool {
        validate_path(rel_path).is_ok() && self.base.join(rel_path).is_file()
    }

    fn file_path(&self, rel_path: &str) -> Option<PathBuf> {
        validate_path(rel_path).ok()?;
        Some(self.base.join(rel_path))
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    files: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut MemoryInner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn remove_file(&mut self, rel_path: &str) -> bool {
        self.with(|inner| inner.files.remove(rel_path).is_some())
    }
}

impl Storage for MemoryStore {
    fn save(&mut self, path: &str, value: &str) -> Result<(), StorageError> {
        validate_path(path)?;
        self.with(|inner| inner.values.insert(path.to_string(), value.to_string()));
        Ok(())
    }

    fn load(&self, path: &str) -> Result<String, StorageError> {
        self.with(|inner| inner.values.get(path).cloned())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn write_file(&mut self, rel_path: &str, contents: &str) -> Result<(), StorageError> {
        validate_path(rel_path)?;
        self.with(|inner| inner.files.insert(rel_path.to_string(), contents.to_string()));
        Ok(())
    }

    fn read_file(&self, rel_path: &str) -> Result<String, StorageError> {
        self.with(|inner| inner.files.get(rel_path).cloned())
            .ok_or_else(|| StorageError::NotFound(rel_path.to_string()))
    }

    fn file_exists(&self, rel_path: &str) -> bool {
        self.with(|inner| inner.files.contains_key(rel_path))
    }
}

// --- Typed scalar helpers ---

pub fn save_u32(store: &mut dyn Storage, path: &str, value: u32) -> Result<(), StorageError> {
    store.save(path, &value.to_string())
}

pub fn save_i8(store: &mut dyn Storage, path: &str, value: i8) -> Result<(), StorageError> {
    store.save(path, &value.to_string())
}

pub fn save_f32(store: &mut dyn Storage, path: &str, value: f32) -> Result<(), StorageError> {
    store.save(path, &value.to_string())
}

pub fn load_string(store: &dyn Storage, path: &str) -> Result<String, StorageError> {
    let raw = store.load(path)?;
    Ok(raw.trim_end_matches(['\n', '\r', '\0']).to_string())
}

fn parse_error(path: &str, value: &str, expected: &'static str) -> StorageError {
    StorageError::Parse {
        path: path.to_string(),
        value: value.to_string(),
        expected,
    }
}

pub fn load_u32(store: &dyn Storage, path: &str) -> Result<u32, StorageError> {
    let raw = store.load(path)?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| parse_error(path, &raw, "u32"))
}

pub fn load_i8(store: &dyn Storage, path: &str) -> Result<i8, StorageError> {
    let raw = store.load(path)?;
    raw.trim()
        .parse::<i8>()
        .map_err(|_| parse_error(path, &raw, "i8"))
}

pub fn load_f32(store: &dyn Storage, path: &str) -> Result<f32, StorageError> {
    let raw = store.load(path)?;
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| parse_error(path, &raw, "f32"))
}
