//! Named JSON documents persisted to disk
//!
//! Each document is a whole-file overwrite.  Readers never fail: a missing, unreadable or corrupt
//! file yields the caller's default.  Writers go through a per-document lock so that
//! load-modify-save sequences for the same document never interleave.

use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const STORE_PATH_REL_HOME: &str = ".config/guildbot";

pub struct Store {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store rooted at the configured directory, or `~/.config/guildbot` if none is configured.
    pub fn open(dir: Option<&Path>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::home_dir()
                .map(|p| p.join(STORE_PATH_REL_HOME))
                .ok_or(anyhow!("Could not find home directory"))?,
        };
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Exclusive access to a document.  Hold the guard across a load and the matching save.
    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(name.to_owned()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn load<T>(&self, name: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.document_path(name);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(
                    "Could not read document `{}`, treating it as empty: {}",
                    path.to_string_lossy(),
                    e
                );
                return T::default();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    "Could not parse document `{}`, treating it as empty: {}",
                    path.to_string_lossy(),
                    e
                );
                T::default()
            }
        }
    }

    pub async fn save<T>(&self, name: &str, document: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let path = self.document_path(name);
        let serialized = serde_json::to_string_pretty(document)
            .map_err(|e| anyhow!("Could not serialize document `{}`: {}", name, e))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            anyhow!(
                "Could not create directory `{}`: {}",
                self.dir.to_string_lossy(),
                e
            )
        })?;

        // Create a temporary file in the same directory.
        let tmp_path = path.with_extension("json.new");

        tokio::fs::write(&tmp_path, serialized).await.map_err(|e| {
            anyhow!(
                "Could not write document to temporary file `{}`: {}",
                tmp_path.to_string_lossy(),
                e
            )
        })?;

        // Atomically rename the temporary file over the target file.
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            anyhow!(
                "Could not rename temporary file `{}` to `{}`: {}",
                tmp_path.to_string_lossy(),
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(())
    }

    /// Load, modify and save a document while holding its lock.
    pub async fn update<T, R, F>(&self, name: &str, f: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.lock(name).await;
        let mut document = self.load::<T>(name).await;
        let result = f(&mut document);
        self.save(name, &document).await?;
        Ok(result)
    }
}
