//! File-backed persistent state
//!
//! Every store owns one JSON file shaped `{ namespace: { key: value } }`.
//! Reads are served from memory. Writes update memory immediately and queue
//! a flush on the runtime; bursts of writes collapse into one disk write.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::application::errors::{BotError, FatalSignal, StorageError};

type StateData = BTreeMap<String, Map<String, Value>>;

/// Opens stores inside one state directory
#[derive(Debug, Clone)]
pub struct StateDirectory {
    root: PathBuf,
    suffix: String,
    fatal: FatalSignal,
}

impl StateDirectory {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>, fatal: FatalSignal) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
            fatal,
        }
    }

    pub fn open(&self, identifier: &str) -> Result<Arc<PersistentStore>, StorageError> {
        let path = self.root.join(format!("{}{}", identifier, self.suffix));
        PersistentStore::open(identifier, path, self.fatal.clone()).map(Arc::new)
    }
}

/// Durable namespace -> key -> value store
#[derive(Debug)]
pub struct PersistentStore {
    identifier: String,
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
    data: RwLock<StateData>,
    flush_queued: AtomicBool,
    write_lock: Mutex<()>,
    fatal: FatalSignal,
}

impl PersistentStore {
    /// Load the backing file, or create an empty one.
    ///
    /// Any failure here leaves the store unusable; callers treat it as fatal.
    pub fn open(
        identifier: impl Into<String>,
        path: impl Into<PathBuf>,
        fatal: FatalSignal,
    ) -> Result<Self, StorageError> {
        let identifier = identifier.into();
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<StateData>(&content).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            let data = StateData::new();
            std::fs::write(&path, serde_json::to_string(&data)?)?;
            data
        };

        tracing::debug!("Opened state '{}' at {}", identifier, path.display());

        Ok(Self {
            identifier,
            inner: Arc::new(StoreInner {
                path,
                data: RwLock::new(data),
                flush_queued: AtomicBool::new(false),
                write_lock: Mutex::new(()),
                fatal,
            }),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn read(&self, namespace: &str, key: &str) -> Option<Value> {
        let data = self.inner.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(namespace).and_then(|ns| ns.get(key)).cloned()
    }

    /// Read and deserialize a value, `None` if absent or of another shape
    pub fn read_as<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        self.read(namespace, key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn read_bool(&self, namespace: &str, key: &str) -> bool {
        self.read(namespace, key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Snapshot of a whole namespace
    pub fn namespace(&self, namespace: &str) -> Option<Map<String, Value>> {
        let data = self.inner.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(namespace).cloned()
    }

    pub fn write(&self, namespace: &str, key: &str, value: impl Into<Value>) {
        self.write_many(namespace, [(key.to_string(), value.into())]);
    }

    /// Write several keys of one namespace in a single step
    pub fn write_many(&self, namespace: &str, entries: impl IntoIterator<Item = (String, Value)>) {
        {
            let mut data = self.inner.data.write().unwrap_or_else(|e| e.into_inner());
            let ns = data.entry(namespace.to_string()).or_default();
            for (key, value) in entries {
                ns.insert(key, value);
            }
        }
        self.queue_flush();
    }

    /// Write the current state to disk now
    pub async fn flush(&self) -> Result<(), StorageError> {
        self.inner.flush_queued.store(false, Ordering::SeqCst);
        self.inner.persist().await
    }

    fn queue_flush(&self) {
        // a flush is already pending and will pick up this write
        if self.inner.flush_queued.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    // let the rest of the current burst land first
                    tokio::task::yield_now().await;
                    if inner.flush_queued.swap(false, Ordering::SeqCst) {
                        if let Err(e) = inner.persist().await {
                            inner.fatal.raise(BotError::Storage(e));
                        }
                    }
                });
            }
            Err(_) => {
                inner.flush_queued.store(false, Ordering::SeqCst);
                if let Err(e) = inner.persist_blocking() {
                    inner.fatal.raise(BotError::Storage(e));
                }
            }
        }
    }
}

impl StoreInner {
    fn snapshot(&self) -> Result<String, StorageError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(serde_json::to_string(&*data)?)
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    async fn persist(&self) -> Result<(), StorageError> {
        // serialize writers so an older snapshot never lands after a newer one
        let _guard = self.write_lock.lock().await;
        let content = self.snapshot()?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::trace!("Flushed state to {}", self.path.display());
        Ok(())
    }

    fn persist_blocking(&self) -> Result<(), StorageError> {
        let content = self.snapshot()?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir, id: &str) -> Arc<PersistentStore> {
        StateDirectory::new(dir.path().join("state"), ".state.json", FatalSignal::detached())
            .open(id)
            .unwrap()
    }

    #[test]
    fn test_open_creates_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "plugin_manager");

        assert!(store.path().exists());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_write_is_visible_immediately() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "greetings");

        assert!(store.read("config", "timeout").is_none());
        store.write("config", "timeout", 30);
        assert_eq!(store.read("config", "timeout"), Some(json!(30)));
        assert_eq!(store.read_as::<i64>("config", "timeout"), Some(30));
        assert!(store.read("other", "timeout").is_none());
    }

    #[tokio::test]
    async fn test_burst_of_writes_is_flushed() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "burst");

        for i in 0..50 {
            store.write("counts", &format!("k{}", i), i);
        }
        store.flush().await.unwrap();

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["counts"]["k49"], json!(49));
        assert_eq!(on_disk["counts"].as_object().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_background_flush_runs_after_current_work() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "deferred");

        store.write("plugin", "active", true);
        // nothing is written until the scheduled flush gets to run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\"active\":true"));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir, "persisted");
            store.write_many(
                "config",
                [
                    ("channel".to_string(), json!("123")),
                    ("roles".to_string(), json!(["1", "2"])),
                ],
            );
            store.flush().await.unwrap();
        }

        let store = open(&dir, "persisted");
        assert_eq!(store.read("config", "channel"), Some(json!("123")));
        assert_eq!(store.namespace("config").unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = PersistentStore::open("broken", &path, FatalSignal::detached());
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_read_bool_defaults_false() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "flags");
        assert!(!store.read_bool("x", "configured"));
        store.write("x", "configured", true);
        assert!(store.read_bool("x", "configured"));
    }
}
