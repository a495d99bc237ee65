use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

use crate::session::EditSession;

/// Cache of live edit sessions keyed by org/module.
///
/// Each session sits behind a fair async mutex: concurrent mutations on the
/// same store queue up and apply strictly in arrival order, one in flight
/// at a time. Entries expire after a TTL, but only clean sessions are
/// evicted — unsaved edits are never dropped by the clock. A successful
/// save invalidates its entry so the next reader starts from disk.
pub struct SessionCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    session: Arc<AsyncMutex<EditSession>>,
    loaded_at: Instant,
}

fn cache_key(org_key: &str, module_key: &str) -> String {
    format!("{}/{}", org_key, module_key)
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        SessionCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a live session, evicting it first if it has expired unused.
    pub fn get(&self, org_key: &str, module_key: &str) -> Option<Arc<AsyncMutex<EditSession>>> {
        let key = cache_key(org_key, module_key);
        let mut entries = self.entries.lock().unwrap();
        let expired = match entries.get(&key) {
            Some(entry) => entry.loaded_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            let entry = entries.get(&key).unwrap();
            // Evict only when provably clean; a locked session is in use.
            let clean = entry
                .session
                .try_lock()
                .map(|session| !session.is_dirty())
                .unwrap_or(false);
            if clean {
                info!("Session cache expired for {}", key);
                entries.remove(&key);
                return None;
            }
        }
        entries.get(&key).map(|e| e.session.clone())
    }

    /// Fetch the session for a key, or build one with `loader` while
    /// holding the map lock so two callers cannot both load and race
    /// their inserts.
    pub fn get_or_try_insert<E>(
        &self,
        org_key: &str,
        module_key: &str,
        loader: impl FnOnce() -> Result<EditSession, E>,
    ) -> Result<Arc<AsyncMutex<EditSession>>, E> {
        if let Some(session) = self.get(org_key, module_key) {
            return Ok(session);
        }
        let key = cache_key(org_key, module_key);
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(&key) {
            return Ok(entry.session.clone());
        }
        let session = Arc::new(AsyncMutex::new(loader()?));
        entries.insert(
            key,
            CacheEntry {
                session: session.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(session)
    }

    pub fn insert(&self, org_key: &str, module_key: &str, session: EditSession) -> Arc<AsyncMutex<EditSession>> {
        let handle = Arc::new(AsyncMutex::new(session));
        self.entries.lock().unwrap().insert(
            cache_key(org_key, module_key),
            CacheEntry {
                session: handle.clone(),
                loaded_at: Instant::now(),
            },
        );
        handle
    }

    /// Drop the entry for a key (called after every successful write).
    pub fn invalidate(&self, org_key: &str, module_key: &str) {
        self.entries
            .lock()
            .unwrap()
            .remove(&cache_key(org_key, module_key));
    }
}
