//! In-memory storage engine
//!
//! A BTreeMap-based engine with the same observable semantics as IndexedDB:
//! versioned databases, upgrade transactions that roll back on failure,
//! key-path primary keys, ascending-key cursors. Useful for:
//! - Unit and integration testing of the facade on native targets
//! - Development without a browser
//!
//! Clones share the same databases, the way two tabs share one origin's
//! IndexedDB. Failures can be injected to exercise error paths.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::rc::Rc;

use serde_json::Value;

use crate::engine::{
    Backend, Connection, Cursor, Opened, UpgradeReport, UpgradeTransaction, VersionChange,
};
use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::migrate::UpgradeHook;

#[derive(Debug, Clone, Default)]
struct MemoryDatabase {
    version: u32,
    stores: BTreeMap<String, MemoryObjectStore>,
}

#[derive(Debug, Clone)]
struct MemoryObjectStore {
    key_path: String,
    records: BTreeMap<Key, Value>,
}

#[derive(Debug, Default)]
struct Faults {
    open: Option<String>,
    upgrade: Option<String>,
    request: Option<String>,
    /// Cursor steps that succeed before the next one fails
    cursor_after: Option<usize>,
}

#[derive(Debug, Default)]
struct Host {
    databases: RefCell<HashMap<String, MemoryDatabase>>,
    faults: RefCell<Faults>,
    requests: Cell<usize>,
}

/// In-memory engine.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    host: Rc<Host>,
    available: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            host: Rc::new(Host::default()),
            available: true,
        }
    }

    /// An engine that reports the capability as missing.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Fail the next `open` before any upgrade runs.
    pub fn fail_next_open(&self, msg: impl Into<String>) {
        self.host.faults.borrow_mut().open = Some(msg.into());
    }

    /// Abort the next upgrade transaction after the hook has run.
    pub fn fail_next_upgrade(&self, msg: impl Into<String>) {
        self.host.faults.borrow_mut().upgrade = Some(msg.into());
    }

    /// Fail the next record request.
    pub fn fail_next_request(&self, msg: impl Into<String>) {
        self.host.faults.borrow_mut().request = Some(msg.into());
    }

    /// Let `steps` cursor moves succeed, then fail the next one.
    pub fn fail_cursor_after(&self, steps: usize) {
        self.host.faults.borrow_mut().cursor_after = Some(steps);
    }

    /// Stored version of `name`, or `None` if it was never created.
    pub fn stored_version(&self, name: &str) -> Option<u32> {
        self.host.databases.borrow().get(name).map(|db| db.version)
    }

    /// Collection names in `name`, in sorted order.
    pub fn store_names(&self, name: &str) -> Vec<String> {
        self.host
            .databases
            .borrow()
            .get(name)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of record requests and cursor steps issued so far.
    pub fn request_count(&self) -> usize {
        self.host.requests.get()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(
        &self,
        name: &str,
        version: u32,
        hook: UpgradeHook,
    ) -> StoreResult<Opened<MemoryConnection>> {
        if !self.available {
            return Err(StoreError::CapabilityUnavailable(
                "memory engine disabled".into(),
            ));
        }
        if let Some(msg) = self.host.faults.borrow_mut().open.take() {
            return Err(StoreError::Connection(msg));
        }

        let mut databases = self.host.databases.borrow_mut();
        let stored = databases.get(name).map(|db| db.version).unwrap_or(0);

        if version < stored {
            return Err(StoreError::Connection(format!(
                "VersionError: requested version ({}) is less than the existing version ({})",
                version, stored
            )));
        }

        let mut upgrade = None;
        if version > stored {
            let change = VersionChange {
                old_version: stored,
                new_version: version,
            };
            // Work on a copy so an aborted upgrade leaves nothing behind
            let mut working = databases.get(name).cloned().unwrap_or_default();
            let created = hook
                .run(&mut MemoryUpgrade { db: &mut working }, change)
                .map_err(|e| StoreError::Connection(format!("upgrade aborted: {}", e)))?;
            if let Some(msg) = self.host.faults.borrow_mut().upgrade.take() {
                return Err(StoreError::Connection(format!("upgrade aborted: {}", msg)));
            }
            working.version = version;
            databases.insert(name.to_string(), working);
            upgrade = Some(UpgradeReport { change, created });
        }

        Ok(Opened {
            connection: MemoryConnection {
                host: self.host.clone(),
                name: Rc::from(name),
                version,
                closed: Rc::new(Cell::new(false)),
            },
            upgrade,
        })
    }
}

struct MemoryUpgrade<'a> {
    db: &'a mut MemoryDatabase,
}

impl UpgradeTransaction for MemoryUpgrade<'_> {
    fn store_names(&self) -> Vec<String> {
        self.db.stores.keys().cloned().collect()
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> StoreResult<()> {
        if self.db.stores.contains_key(name) {
            return Err(StoreError::ConstraintViolation(format!(
                "ConstraintError: object store '{}' already exists",
                name
            )));
        }
        self.db.stores.insert(
            name.to_string(),
            MemoryObjectStore {
                key_path: key_path.to_string(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }
}

/// Connection to one in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    host: Rc<Host>,
    name: Rc<str>,
    version: u32,
    closed: Rc<Cell<bool>>,
}

impl MemoryConnection {
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Count the request and surface any injected failure.
    fn begin(&self) -> StoreResult<()> {
        if self.closed.get() {
            return Err(StoreError::Request(
                "InvalidStateError: the database connection is closing".into(),
            ));
        }
        self.host.requests.set(self.host.requests.get() + 1);
        if let Some(msg) = self.host.faults.borrow_mut().request.take() {
            return Err(StoreError::Request(msg));
        }
        Ok(())
    }

    /// Run `f` against `store` inside a transaction on this database.
    fn with_store<T>(
        &self,
        store: &str,
        f: impl FnOnce(&mut MemoryObjectStore) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.begin()?;
        let mut databases = self.host.databases.borrow_mut();
        let object_store = databases
            .get_mut(&*self.name)
            .and_then(|db| db.stores.get_mut(store))
            .ok_or_else(|| {
                StoreError::Request(format!(
                    "NotFoundError: no object store named '{}' in '{}'",
                    store, self.name
                ))
            })?;
        f(object_store)
    }
}

impl Connection for MemoryConnection {
    type Cursor = MemoryCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    async fn add(&self, store: &str, record: &Value) -> StoreResult<Key> {
        self.with_store(store, |s| {
            let key = Key::extract(record, &s.key_path)?;
            if s.records.contains_key(&key) {
                return Err(StoreError::ConstraintViolation(format!(
                    "ConstraintError: key {} already exists in '{}'",
                    key, store
                )));
            }
            s.records.insert(key.clone(), record.clone());
            Ok(key)
        })
    }

    async fn put(&self, store: &str, record: &Value) -> StoreResult<Key> {
        self.with_store(store, |s| {
            let key = Key::extract(record, &s.key_path)?;
            s.records.insert(key.clone(), record.clone());
            Ok(key)
        })
    }

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Value>> {
        self.with_store(store, |s| Ok(s.records.get(key).cloned()))
    }

    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()> {
        self.with_store(store, |s| {
            s.records.remove(key);
            Ok(())
        })
    }

    async fn clear(&self, store: &str) -> StoreResult<()> {
        self.with_store(store, |s| {
            s.records.clear();
            Ok(())
        })
    }

    async fn count(&self, store: &str) -> StoreResult<usize> {
        self.with_store(store, |s| Ok(s.records.len()))
    }

    async fn open_cursor(&self, store: &str) -> StoreResult<Option<MemoryCursor>> {
        let first = self.with_store(store, |s| {
            Ok(s.records
                .iter()
                .next()
                .map(|(k, v)| (k.clone(), v.clone())))
        })?;
        Ok(first.map(|(key, value)| MemoryCursor {
            conn: self.clone(),
            store: store.to_string(),
            key,
            value,
        }))
    }

    fn close(&self) {
        self.closed.set(true);
    }
}

/// Cursor over one in-memory collection.
///
/// Positions are keys, so records inserted or deleted mid-scan are seen the
/// way a live IndexedDB cursor would see them.
#[derive(Debug)]
pub struct MemoryCursor {
    conn: MemoryConnection,
    store: String,
    key: Key,
    value: Value,
}

impl MemoryCursor {
    fn step(&mut self, count: u32) -> StoreResult<bool> {
        {
            let mut faults = self.conn.host.faults.borrow_mut();
            match faults.cursor_after {
                Some(0) => {
                    faults.cursor_after = None;
                    return Err(StoreError::Cursor(format!(
                        "cursor on '{}' failed after key {}",
                        self.store, self.key
                    )));
                }
                Some(n) => faults.cursor_after = Some(n - 1),
                None => {}
            }
        }

        let current = self.key.clone();
        let next = self.conn.with_store(&self.store, |s| {
            Ok(s.records
                .range((Bound::Excluded(current), Bound::Unbounded))
                .nth(count as usize - 1)
                .map(|(k, v)| (k.clone(), v.clone())))
        })?;

        match next {
            Some((key, value)) => {
                self.key = key;
                self.value = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Cursor for MemoryCursor {
    fn value(&self) -> StoreResult<Value> {
        Ok(self.value.clone())
    }

    async fn advance(&mut self, count: u32) -> StoreResult<bool> {
        if count == 0 {
            return Err(StoreError::Cursor(
                "TypeError: advance count must be positive".into(),
            ));
        }
        self.step(count)
    }

    async fn continue_(&mut self) -> StoreResult<bool> {
        self.step(1)
    }
}
