//! The storage client facade
//!
//! `StorageClient` owns the engine, the initialization state and the
//! published handle. Every record operation follows one pattern: gate check,
//! one transaction scoped to one collection, one request, one result.

use std::cell::Cell;
use std::fmt::Debug;
use std::future::Future;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::cell::{HandleCell, HandleSubscription};
use crate::collection::Collection;
use crate::config::{ClientConfig, DatabaseConfig, Page, SchemaDescriptor, StoreConfig};
use crate::engine::{Backend, Connection, UpgradeReport};
use crate::error::{StoreError, StoreResult};
use crate::gate;
use crate::key::Key;
use crate::logging::prefix;
use crate::migrate::UpgradeHook;
use crate::scan;
use crate::state::InitState;

/// Outcome of a successful [`StorageClient::initialize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Initialized {
    pub name: String,
    pub version: u32,
    /// Present when the open ran a migration ("setup complete").
    pub setup: Option<UpgradeReport>,
}

/// Asynchronous facade over a transactional object-store engine.
///
/// All methods take `&self`; share the client with `Rc` across tasks.
pub struct StorageClient<B: Backend> {
    backend: B,
    debug: Cell<bool>,
    state: Rc<watch::Sender<InitState>>,
    handle: HandleCell<B::Connection>,
}

impl<B: Backend> StorageClient<B> {
    pub fn new(backend: B) -> Self {
        let (state, _rx) = watch::channel(InitState::Closed);
        Self {
            backend,
            debug: Cell::new(false),
            state: Rc::new(state),
            handle: HandleCell::new(),
        }
    }

    /// Trace every operation's inputs and outputs at debug level.
    pub fn with_debug(self, debug: bool) -> Self {
        self.debug.set(debug);
        self
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.set(debug);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> InitState {
        self.state.borrow().clone()
    }

    /// Watch state transitions. The receiver starts at the current state.
    pub fn subscribe_state(&self) -> watch::Receiver<InitState> {
        self.state.subscribe()
    }

    /// Receive the ready handle; replays it if already published.
    pub fn subscribe(&self) -> HandleSubscription<B::Connection> {
        self.handle.subscribe()
    }

    /// The ready handle, if initialization has completed.
    pub fn connection(&self) -> Option<B::Connection> {
        self.handle.current()
    }

    /// Wait until initialization settles.
    ///
    /// Resolves immediately if already `Ready`; fails with the stored error
    /// if initialization `Failed`.
    pub async fn ready(&self) -> StoreResult<()> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(InitState::is_settled)
            .await
            .map_err(|_| StoreError::NotInitialized)?
            .clone();
        match state {
            InitState::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Initialize from a [`ClientConfig`], applying its debug flag.
    pub async fn initialize_with(&self, config: &ClientConfig) -> StoreResult<Initialized> {
        self.set_debug(config.debug);
        self.initialize(config.database.clone(), config.stores.clone())
            .await
    }

    /// Open `database`, migrating to `stores` if its version increased, and
    /// publish the ready handle.
    ///
    /// Calling this again while `Ready` replaces the handle and closes the
    /// previous connection. Failures move the client to `Failed` and are not
    /// retried.
    pub async fn initialize(
        &self,
        database: DatabaseConfig,
        stores: Vec<StoreConfig>,
    ) -> StoreResult<Initialized> {
        match self.open(&database, stores).await {
            Ok(initialized) => Ok(initialized),
            Err(e) => {
                error!(
                    "{} initialization of '{}' v{} failed: {}",
                    prefix::DB,
                    database.name,
                    database.version,
                    e
                );
                if let Some(previous) = self.handle.clear() {
                    previous.close();
                }
                self.state.send_replace(InitState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    async fn open(
        &self,
        database: &DatabaseConfig,
        stores: Vec<StoreConfig>,
    ) -> StoreResult<Initialized> {
        database.validate()?;
        let schema = SchemaDescriptor::new(stores)?;

        if !self.backend.is_available() {
            return Err(StoreError::CapabilityUnavailable(
                "no storage engine in this environment".into(),
            ));
        }

        self.state.send_replace(InitState::Opening);
        info!(
            "{} opening '{}' v{}",
            prefix::DB,
            database.name,
            database.version
        );

        let hook = UpgradeHook::new(schema).with_state(self.state.clone());
        let opened = self
            .backend
            .open(&database.name, database.version, hook)
            .await?;

        let conn = &opened.connection;
        info!(
            "{} connection open: '{}' v{}",
            prefix::OPEN,
            conn.name(),
            conn.version()
        );
        let initialized = Initialized {
            name: conn.name().to_string(),
            version: conn.version(),
            setup: opened.upgrade.clone(),
        };
        if let Some(report) = &opened.upgrade {
            info!(
                "{} setup complete: v{} -> v{}, created {:?}",
                prefix::DB,
                report.change.old_version,
                report.change.new_version,
                report.created
            );
        }

        if let Some(previous) = self.handle.publish(opened.connection) {
            debug!("{} closing replaced connection", prefix::DB);
            previous.close();
        }
        self.state.send_replace(InitState::Ready);

        Ok(initialized)
    }

    /// Close the connection and return to `Closed`.
    pub fn close(&self) {
        if let Some(conn) = self.handle.clear() {
            info!("{} closing '{}'", prefix::CLOSE, conn.name());
            conn.close();
        }
        self.state.send_replace(InitState::Closed);
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Insert a new record. Fails with `ConstraintViolation` if its key exists.
    pub async fn insert(&self, store: &str, record: &Value) -> StoreResult<Key> {
        self.run("insert", store, record, |conn| async move {
            conn.add(store, record).await
        })
        .await
    }

    /// Read up to `page.limit` records after skipping `page.skip`.
    pub async fn find_paginated(&self, store: &str, page: Page) -> StoreResult<Vec<Value>> {
        self.run("find_paginated", store, &page, |conn| async move {
            scan::scan(&conn, store, page).await
        })
        .await
    }

    /// Point lookup. A missing record is `Ok(None)`.
    pub async fn find_by_id(
        &self,
        store: &str,
        key: impl Into<Key>,
    ) -> StoreResult<Option<Value>> {
        let key: &Key = &key.into();
        self.run("find_by_id", store, key, |conn| async move {
            conn.get(store, key).await
        })
        .await
    }

    /// Insert or fully replace a record.
    pub async fn update(&self, store: &str, record: &Value) -> StoreResult<Key> {
        self.run("update", store, record, |conn| async move {
            conn.put(store, record).await
        })
        .await
    }

    /// Delete by key. Succeeds whether or not the key existed.
    pub async fn delete(&self, store: &str, key: impl Into<Key>) -> StoreResult<()> {
        let key: &Key = &key.into();
        self.run("delete", store, key, |conn| async move {
            conn.delete(store, key).await
        })
        .await
    }

    /// Remove every record in `store`.
    pub async fn delete_all(&self, store: &str) -> StoreResult<()> {
        self.run("delete_all", store, &(), |conn| async move {
            conn.clear(store).await
        })
        .await
    }

    pub async fn count(&self, store: &str) -> StoreResult<usize> {
        self.run("count", store, &(), |conn| async move {
            conn.count(store).await
        })
        .await
    }

    /// Typed view over one collection.
    pub fn collection<T>(&self, name: impl Into<String>) -> Collection<'_, B, T> {
        Collection::new(self, name.into())
    }

    /// Gate, run one request, trace the outcome when debugging.
    async fn run<T, F, Fut>(
        &self,
        op: &'static str,
        store: &str,
        input: &dyn Debug,
        f: F,
    ) -> StoreResult<T>
    where
        T: Debug,
        F: FnOnce(B::Connection) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let result = match gate::check(&self.handle) {
            Ok(conn) => f(conn).await,
            Err(e) => Err(e),
        };
        if self.debug.get() {
            debug!(op, store, input = ?input, output = ?result, "{} {}", prefix::DB, op);
        }
        result
    }
}
