//! Durable key/value storage for the session credential pair.
//!
//! The token and the role are kept as two independent string entries
//! ([`TOKEN_KEY`], [`ROLE_KEY`]), the way a browser keeps them in local
//! storage. Keeping them consistent is the session manager's job; a store only
//! persists what it is told.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::Error;

/// Entry holding the raw access token.
pub const TOKEN_KEY: &str = "take2_token";
/// Entry holding the role discriminator (`"client"` or `"admin"`).
pub const ROLE_KEY: &str = "take2_role";

/// Persistent string key/value storage.
///
/// # Example
///
/// ```rust,ignore
/// impl CredentialStore for KeyringStore {
///     fn get(&self, key: &str) -> Result<Option<String>, Error> {
///         self.entry(key).get_password().map(Some).or_else(not_found_as_none)
///     }
///     // ...
/// }
/// ```
pub trait CredentialStore: Send + Sync + 'static {
    /// Read an entry. Missing entries are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write an entry, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Delete an entry. Deleting a missing entry is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Process-local store. Nothing survives a restart; useful for tests and
/// embedding where persistence is handled elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// The file is read once on [`open`](Self::open) and rewritten on every change
/// (temp file + rename, so a crash never leaves half a file behind). On Unix
/// the file is created with mode `0600`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read or is
    /// not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Storage(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", path.display()))),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling of the store file, never equal to it.
    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), Error> {
        let storage_err =
            |e: std::io::Error| Error::Storage(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::Storage(format!("serialize: {e}")))?;

        let tmp = self.temp_path();
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp).map_err(storage_err)?;
        file.write_all(&body).map_err(storage_err)?;
        file.sync_all().map_err(storage_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(storage_err)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = entries.insert(key.to_owned(), value.to_owned());
        if previous.as_deref() == Some(value) {
            return Ok(());
        }
        self.flush(&entries).inspect_err(|_| {
            match previous {
                Some(old) => entries.insert(key.to_owned(), old),
                None => entries.remove(key),
            };
        })
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        self.flush(&entries).inspect_err(|_| {
            entries.insert(key.to_owned(), previous);
        })
    }
}
