use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Error;
use crate::types::UserId;

/// Keys of the persisted token record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    AccessToken,
    RefreshToken,
    UserId,
}

impl StoreKey {
    pub const ALL: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::UserId];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "auth_token",
            Self::RefreshToken => "refresh_token",
            Self::UserId => "user_id",
        }
    }
}

/// Durable key-value storage for session credentials.
///
/// Must survive process restarts for sessions to be restorable. Calls are
/// synchronous so that `SessionManager::is_authenticated` can stay
/// synchronous too.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStore for KeychainStore {
///     fn get(&self, key: StoreKey) -> Result<Option<String>, Error> {
///         self.keychain.read(key.as_str()).map_err(|e| Error::Store(e.to_string()))
///     }
///     // ...
/// }
/// ```
pub trait TokenStore: Send + Sync + 'static {
    fn get(&self, key: StoreKey) -> Result<Option<String>, Error>;

    fn set(&self, key: StoreKey, value: &str) -> Result<(), Error>;

    fn remove(&self, key: StoreKey) -> Result<(), Error>;
}

/// The three persisted credentials, read and written as one unit.
#[derive(Clone, PartialEq, Eq)]
pub struct PersistedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: UserId,
}

impl std::fmt::Debug for PersistedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedTokens")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Outcome of reading the persisted record.
#[derive(Debug)]
pub(crate) enum Loaded {
    Empty,
    Complete(PersistedTokens),
    /// Some keys present but not a usable record.
    Partial,
}

impl PersistedTokens {
    pub(crate) fn load<S: TokenStore + ?Sized>(store: &S) -> Result<Loaded, Error> {
        let access_token = store.get(StoreKey::AccessToken)?;
        let refresh_token = store.get(StoreKey::RefreshToken)?;
        let user_id = store.get(StoreKey::UserId)?;

        Ok(match (access_token, refresh_token, user_id) {
            (None, None, None) => Loaded::Empty,
            (Some(access_token), Some(refresh_token), Some(user_id)) => {
                match user_id.parse::<UserId>() {
                    Ok(user_id) => Loaded::Complete(Self {
                        access_token,
                        refresh_token,
                        user_id,
                    }),
                    Err(_) => Loaded::Partial,
                }
            }
            _ => Loaded::Partial,
        })
    }

    pub(crate) fn save<S: TokenStore + ?Sized>(&self, store: &S) -> Result<(), Error> {
        store.set(StoreKey::AccessToken, &self.access_token)?;
        store.set(StoreKey::RefreshToken, &self.refresh_token)?;
        store.set(StoreKey::UserId, &self.user_id.to_string())
    }

    /// Removes every key, attempting all of them even if one fails.
    pub(crate) fn clear<S: TokenStore + ?Sized>(store: &S) -> Result<(), Error> {
        let mut first_error = None;
        for key in StoreKey::ALL {
            if let Err(e) = store.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// In-process store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<&'static str, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().get(key.as_str()).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), Error> {
        self.entries.lock().insert(key.as_str(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: StoreKey) -> Result<(), Error> {
        self.entries.lock().remove(key.as_str());
        Ok(())
    }
}

/// JSON file holding the record as a flat string map.
///
/// A missing file reads as an empty store. Writes replace the file through
/// a temporary sibling so a crash never leaves half a record on disk.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, Error> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Store(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::Store(format!("{}: {e}", self.path.display()))),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), Error> {
        let io_err = |e: std::io::Error| Error::Store(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(map)?).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        apply(&mut map);
        self.write_map(&map)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: StoreKey) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key.as_str()))
    }

    fn set(&self, key: StoreKey, value: &str) -> Result<(), Error> {
        self.update(|map| {
            map.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StoreKey) -> Result<(), Error> {
        self.update(|map| {
            map.remove(key.as_str());
        })
    }
}
