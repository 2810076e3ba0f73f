//! Storage engine abstraction
//!
//! These traits describe the host engine the facade drives: a
//! capability-gated, name+version addressed, transactional object-store
//! engine. Implementations exist for:
//!
//! - **Memory**: in-process engine with IndexedDB semantics (`MemoryBackend`)
//! - **IndexedDB**: browser storage via web-sys (separate crate, WASM only)
//!
//! Every request opens its own transaction scoped to one collection. Futures
//! are not `Send`: the browser engine's handles live on one thread.

#![allow(async_fn_in_trait)]

use serde::Serialize;
use serde_json::Value;

use crate::error::StoreResult;
use crate::key::Key;
use crate::migrate::UpgradeHook;

/// Version change observed while opening a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionChange {
    /// Stored version before the upgrade; 0 for a newly created database.
    pub old_version: u32,
    pub new_version: u32,
}

/// Result of opening a database.
#[derive(Debug, Clone)]
pub struct Opened<C> {
    pub connection: C,
    /// Collections created by the upgrade, if one ran.
    pub upgrade: Option<UpgradeReport>,
}

/// What a completed upgrade transaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub change: VersionChange,
    pub created: Vec<String>,
}

/// A host storage engine.
pub trait Backend {
    type Connection: Connection;

    /// Whether the host provides the engine at all.
    fn is_available(&self) -> bool;

    /// Open (or create) `name` at `version`.
    ///
    /// When `version` exceeds the stored version the engine runs one upgrade
    /// transaction and calls `hook.run` inside it. The returned future only
    /// resolves after that transaction has committed.
    async fn open(
        &self,
        name: &str,
        version: u32,
        hook: UpgradeHook,
    ) -> StoreResult<Opened<Self::Connection>>;
}

/// Collection management available inside an upgrade transaction.
pub trait UpgradeTransaction {
    /// Names of collections that already exist.
    fn store_names(&self) -> Vec<String>;

    /// Create a collection keyed by `key_path`.
    ///
    /// Fails with `StoreError::ConstraintViolation` if it already exists.
    fn create_store(&mut self, name: &str, key_path: &str) -> StoreResult<()>;
}

/// An open connection to one database.
///
/// Cloning is cheap and yields another reference to the same connection.
pub trait Connection: Clone {
    type Cursor: Cursor;

    fn name(&self) -> &str;

    fn version(&self) -> u32;

    /// Insert a record; fails with `ConstraintViolation` if the key exists.
    async fn add(&self, store: &str, record: &Value) -> StoreResult<Key>;

    /// Insert or replace a record.
    async fn put(&self, store: &str, record: &Value) -> StoreResult<Key>;

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Value>>;

    /// Delete by key. Missing keys are not an error.
    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()>;

    async fn clear(&self, store: &str) -> StoreResult<()>;

    async fn count(&self, store: &str) -> StoreResult<usize>;

    /// Open a cursor in ascending key order.
    ///
    /// Returns `None` when the collection is empty.
    async fn open_cursor(&self, store: &str) -> StoreResult<Option<Self::Cursor>>;

    fn close(&self);
}

/// A positioned cursor over one collection.
pub trait Cursor {
    /// The record at the current position.
    fn value(&self) -> StoreResult<Value>;

    /// Move forward `count` positions (`count > 0`).
    ///
    /// Returns `false` once the cursor runs past the last record.
    async fn advance(&mut self, count: u32) -> StoreResult<bool>;

    /// Move forward one position.
    async fn continue_(&mut self) -> StoreResult<bool>;
}
