//! Local session storage: the credential (`auth_token`) and the cached identity
//! (`user_info`) kept side by side in a persistent key-value store, plus the pure
//! consistency repair that keeps the two keys paired.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

use super::principal::Identity;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_INFO_KEY: &str = "user_info";

/// Persistent string key-value storage shared by every page of the client.
///
/// Implementations use interior mutability so one store can be shared through an
/// `Arc` by the guard, the profile client and the logout action.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// Process-local store, used by tests and embedders without a disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: RwLock::new(map) }
    }

    /// Sorted copy of every entry, for comparing states.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk, standing in for browser local
/// storage. A missing file is an empty store. Writes go to a sibling temp file that
/// is renamed over the existing file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read_all(&self) -> AppResult<BTreeMap<String, String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            AppError::io("storage_corrupt".to_string(), format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let _g = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let _g = self.lock.lock();
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map)
    }

    /// A file that no longer parses is reset to an empty store, so clearing the session
    /// always leaves it usable again.
    fn remove(&self, key: &str) -> AppResult<()> {
        let _g = self.lock.lock();
        let mut map = match self.read_all() {
            Ok(map) => map,
            Err(e) if e.code_str() == "storage_corrupt" => {
                warn!(target: "quiver::session", "resetting unreadable session file: {}", e);
                return self.write_all(&BTreeMap::new());
            }
            Err(e) => return Err(e),
        };
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}

/// Snapshot of the two session keys. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub token: Option<String>,
    pub user_info: Option<String>,
}

impl AuthState {
    pub fn load(store: &dyn SessionStore) -> AppResult<Self> {
        Ok(Self {
            token: non_empty(store.get(TOKEN_KEY)?),
            user_info: non_empty(store.get(USER_INFO_KEY)?),
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.token.is_some() == self.user_info.is_some()
    }

    /// Decode the cached identity, if any. A corrupt cache decodes to `None`.
    pub fn cached_identity(&self) -> Option<Identity> {
        let raw = self.user_info.as_deref()?;
        match Identity::from_storage_str(raw) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(target: "quiver::session", "ignoring unreadable cached identity: {}", e);
                None
            }
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// What `repair` deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub dropped_user_info: bool,
    pub dropped_token: bool,
}

impl RepairReport {
    pub fn changed(&self) -> bool { self.dropped_user_info || self.dropped_token }
}

/// Restore the pairing invariant between `auth_token` and `user_info`.
///
/// A cached identity without a token is stale and is dropped; a token without a cached
/// identity is untrusted leftover state and is dropped too. Each step only deletes a key
/// when the other one is missing, so running it twice, or from two callers in either
/// order, leaves the same state. Returns the state re-read after the repair.
pub fn repair(store: &dyn SessionStore) -> AppResult<(AuthState, RepairReport)> {
    let before = AuthState::load(store)?;
    let mut report = RepairReport::default();
    if before.token.is_none() && before.user_info.is_some() {
        warn!(target: "quiver::session", "inconsistent state: cached identity without token, clearing {}", USER_INFO_KEY);
        store.remove(USER_INFO_KEY)?;
        report.dropped_user_info = true;
    }
    if before.token.is_some() && before.user_info.is_none() {
        warn!(target: "quiver::session", "inconsistent state: token without cached identity, clearing {}", TOKEN_KEY);
        store.remove(TOKEN_KEY)?;
        report.dropped_token = true;
    }
    let after = AuthState::load(store)?;
    Ok((after, report))
}

/// Drop both keys (logout or rejected credentials).
pub fn clear(store: &dyn SessionStore) -> AppResult<()> {
    store.remove(TOKEN_KEY)?;
    store.remove(USER_INFO_KEY)?;
    Ok(())
}

/// Record a fresh login: token and identity are written as one logical record.
pub fn store_login(store: &dyn SessionStore, token: &str, identity: &Identity) -> AppResult<()> {
    if token.is_empty() {
        return Err(AppError::user("empty_token", "token must not be empty"));
    }
    store.set(USER_INFO_KEY, &identity.to_storage_string())?;
    store.set(TOKEN_KEY, token)?;
    Ok(())
}
