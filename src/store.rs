use crate::error::{ForkbombError, Result};
use crate::fork::{Fork, ForkHandle};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Durable attribute store for fork records. Last writer wins.
pub trait ForkStore {
    fn find(&self, handle: &ForkHandle) -> Result<Option<Fork>>;

    /// Forks owned by `owner`, ordered by repo name (byte order, case-sensitive).
    fn list_for_owner(&self, owner: &str) -> Result<Vec<Fork>>;

    /// Applies the pre-save normalization, stamps `updated_at`, and persists.
    fn save(&self, fork: &mut Fork, now: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    forks: Mutex<BTreeMap<ForkHandle, Fork>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_forks(forks: Vec<Fork>) -> Self {
        let map = forks.into_iter().map(|f| (f.handle(), f)).collect();
        Self {
            forks: Mutex::new(map),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ForkHandle, Fork>>> {
        self.forks
            .lock()
            .map_err(|_| ForkbombError::Store("fork store lock poisoned".to_string()))
    }

    fn snapshot(&self) -> Result<Vec<Fork>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

impl ForkStore for MemoryStore {
    fn find(&self, handle: &ForkHandle) -> Result<Option<Fork>> {
        Ok(self.lock()?.get(handle).cloned())
    }

    fn list_for_owner(&self, owner: &str) -> Result<Vec<Fork>> {
        Ok(self
            .lock()?
            .values()
            .filter(|f| f.owner == owner)
            .cloned()
            .collect())
    }

    fn save(&self, fork: &mut Fork, now: DateTime<Utc>) -> Result<()> {
        fork.normalize();
        fork.updated_at = now;
        self.lock()?.insert(fork.handle(), fork.clone());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ForkFile {
    #[serde(default)]
    forks: Vec<Fork>,
}

/// A [`MemoryStore`] mirrored to a TOML file after every save.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: ForkFile = read_toml(&path)?;
        Ok(Self {
            path,
            inner: MemoryStore::from_forks(file.forks),
        })
    }
}

impl ForkStore for FileStore {
    fn find(&self, handle: &ForkHandle) -> Result<Option<Fork>> {
        self.inner.find(handle)
    }

    fn list_for_owner(&self, owner: &str) -> Result<Vec<Fork>> {
        self.inner.list_for_owner(owner)
    }

    fn save(&self, fork: &mut Fork, now: DateTime<Utc>) -> Result<()> {
        self.inner.save(fork, now)?;
        let file = ForkFile {
            forks: self.inner.snapshot()?,
        };
        write_toml(&self.path, &file)
    }
}

/// Missing files read as the default value.
pub(crate) fn read_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = toml::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // write-then-rename so a crash never leaves a truncated file behind
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
