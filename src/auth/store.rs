//! The current credential pair and where it is kept.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{lock, KeyValueStore};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_owned()
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential pair has an empty access or refresh token")]
    InvalidCredential,
    #[error("storage: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Holds at most one [`CredentialPair`].
///
/// Only the two tokens reach the backing [`KeyValueStore`]; the token type
/// lives in memory and falls back to `bearer` after a restart.
pub struct TokenStore {
    backend: Box<dyn KeyValueStore>,
    token_type: Mutex<Option<String>>,
    epoch: AtomicU64,
}

impl TokenStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            token_type: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    /// The stored pair, present only when both tokens are.
    pub fn get(&self) -> Option<CredentialPair> {
        let access_token = self.access_token()?;
        let refresh_token = self.refresh_token()?;
        let token_type = lock(&self.token_type)
            .clone()
            .unwrap_or_else(default_token_type);
        Some(CredentialPair {
            access_token,
            refresh_token,
            token_type,
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Replaces the stored pair wholesale.
    ///
    /// If the backend fails halfway the previous pair is written back, or the
    /// store is cleared when that is not possible either.
    pub fn set(&self, pair: CredentialPair) -> Result<(), Error> {
        if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
            return Err(Error::InvalidCredential);
        }
        let previous = self.get();
        if let Err(err) = self.write(&pair) {
            warn!(message = "Failed to store credential pair, rolling back", error = %err);
            let restored = previous.map_or(false, |previous| self.write(&previous).is_ok());
            if !restored {
                self.clear();
            }
            return Err(Error::Storage(err));
        }
        *lock(&self.token_type) = Some(pair.token_type);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Bumped by every successful [`TokenStore::set`]; tells one stored
    /// session apart from the next.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(err) = self.backend.remove(key) {
                warn!(message = "Failed to remove stored token", key, error = %err);
            }
        }
        *lock(&self.token_type) = None;
    }

    fn write(&self, pair: &CredentialPair) -> anyhow::Result<()> {
        self.backend.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.backend.set(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Option<String> {
        self.backend.get(key).filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        lock(&self.entries).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

/// Keeps the entries in a JSON file, rewritten on every change and deleted
/// once empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, loading existing entries if the file is there.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read token file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse token file {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn save(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove token file")?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents).context("Failed to write token file")?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_owned(), value.to_owned());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
