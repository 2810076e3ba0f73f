//! IndexedDB engine for the idbridge facade.
//!
//! Every request opens its own transaction on one object store, issues one
//! request and awaits it. Writes also await transaction completion so a
//! resolved future means the data is committed.

use std::rc::Rc;

use idbridge_core::{
    Backend, Connection, Cursor, Key, Opened, StoreError, StoreResult, UpgradeHook,
};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{IdbCursorWithValue, IdbDatabase, IdbRequest, IdbTransaction, IdbTransactionMode};

use crate::convert::{js_to_key, js_to_value, key_to_js, value_to_js};
use crate::error::IndexedDbError;
use crate::idb;

/// The browser's IndexedDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbBackend;

impl IndexedDbBackend {
    pub fn new() -> Self {
        Self
    }

    /// Delete a database by name (for testing/cleanup).
    pub async fn delete_database(name: &str) -> StoreResult<()> {
        idb::delete_database(name).await.map_err(StoreError::from)
    }
}

impl Backend for IndexedDbBackend {
    type Connection = IndexedDbConnection;

    fn is_available(&self) -> bool {
        idb::idb_factory().is_ok()
    }

    async fn open(
        &self,
        name: &str,
        version: u32,
        hook: UpgradeHook,
    ) -> StoreResult<Opened<IndexedDbConnection>> {
        let (db, upgrade) = idb::open_database(name, version, hook).await?;
        Ok(Opened {
            connection: IndexedDbConnection::new(db, name, version),
            upgrade,
        })
    }
}

/// Type alias for the versionchange closure kept alive by the connection
type VersionChangeClosure = Rc<Closure<dyn FnMut(web_sys::Event)>>;

/// An open IndexedDB database.
#[derive(Debug, Clone)]
pub struct IndexedDbConnection {
    db: IdbDatabase,
    name: Rc<str>,
    version: u32,
    _on_versionchange: VersionChangeClosure,
}

impl IndexedDbConnection {
    fn new(db: IdbDatabase, name: &str, version: u32) -> Self {
        // Step aside when another connection upgrades the database
        let db_for_close = db.clone();
        let name_for_close = name.to_string();
        let on_versionchange = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            tracing::info!("'{}' upgraded elsewhere, closing connection", name_for_close);
            db_for_close.close();
        }) as Box<dyn FnMut(web_sys::Event)>);
        db.set_onversionchange(Some(on_versionchange.as_ref().unchecked_ref()));

        Self {
            db,
            name: Rc::from(name),
            version,
            _on_versionchange: Rc::new(on_versionchange),
        }
    }

    pub fn database(&self) -> &IdbDatabase {
        &self.db
    }

    /// Issue one write request and wait for its transaction to commit.
    async fn write(
        &self,
        store: &str,
        request: impl FnOnce(&web_sys::IdbObjectStore) -> Result<IdbRequest, JsValue>,
    ) -> StoreResult<JsValue> {
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readwrite)?;
        let req = request(&object_store).map_err(IndexedDbError::from_request)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(result)
    }

    /// Issue one read request.
    async fn read(
        &self,
        store: &str,
        request: impl FnOnce(&web_sys::IdbObjectStore) -> Result<IdbRequest, JsValue>,
    ) -> StoreResult<JsValue> {
        let (_tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;
        let req = request(&object_store).map_err(IndexedDbError::from_request)?;
        Ok(idb::await_request(&req).await?)
    }
}

impl Connection for IndexedDbConnection {
    type Cursor = IndexedDbCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    async fn add(&self, store: &str, record: &Value) -> StoreResult<Key> {
        let js_val = value_to_js(record)?;
        let key = self.write(store, |s| s.add(&js_val)).await?;
        Ok(js_to_key(&key)?)
    }

    async fn put(&self, store: &str, record: &Value) -> StoreResult<Key> {
        let js_val = value_to_js(record)?;
        let key = self.write(store, |s| s.put(&js_val)).await?;
        Ok(js_to_key(&key)?)
    }

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Value>> {
        let js_key = key_to_js(key);
        let result = self.read(store, |s| s.get(&js_key)).await?;
        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        Ok(Some(js_to_value(&result)?))
    }

    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()> {
        let js_key = key_to_js(key);
        self.write(store, |s| s.delete(&js_key)).await?;
        Ok(())
    }

    async fn clear(&self, store: &str) -> StoreResult<()> {
        self.write(store, |s| s.clear()).await?;
        Ok(())
    }

    async fn count(&self, store: &str) -> StoreResult<usize> {
        let result = self.read(store, |s| s.count()).await?;
        result
            .as_f64()
            .map(|n| n as usize)
            .ok_or_else(|| StoreError::Request(format!("count returned {:?}", result)))
    }

    async fn open_cursor(&self, store: &str) -> StoreResult<Option<IndexedDbCursor>> {
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;
        let request = object_store
            .open_cursor()
            .map_err(IndexedDbError::from_request)?;
        let result = idb::await_request(&request).await.map_err(cursor_error)?;
        if result.is_null() || result.is_undefined() {
            return Ok(None);
        }
        let cursor = result
            .dyn_into::<IdbCursorWithValue>()
            .map_err(|_| StoreError::Cursor("openCursor result is not a cursor".into()))?;
        Ok(Some(IndexedDbCursor {
            _tx: tx,
            request,
            cursor,
        }))
    }

    fn close(&self) {
        self.db.set_onversionchange(None);
        self.db.close();
    }
}

fn cursor_error(err: IndexedDbError) -> StoreError {
    match err {
        IndexedDbError::Request(msg) | IndexedDbError::Transaction(msg) => StoreError::Cursor(msg),
        other => other.into(),
    }
}

/// A value cursor over one object store.
///
/// The same request fires `success` again after every advance/continue; a
/// null result means the cursor ran off the end.
#[derive(Debug)]
pub struct IndexedDbCursor {
    _tx: IdbTransaction,
    request: IdbRequest,
    cursor: IdbCursorWithValue,
}

impl IndexedDbCursor {
    async fn settle(&mut self) -> StoreResult<bool> {
        let result = idb::await_request(&self.request)
            .await
            .map_err(cursor_error)?;
        if result.is_null() || result.is_undefined() {
            return Ok(false);
        }
        self.cursor = result
            .dyn_into::<IdbCursorWithValue>()
            .map_err(|_| StoreError::Cursor("cursor request yielded a non-cursor".into()))?;
        Ok(true)
    }
}

impl Cursor for IndexedDbCursor {
    fn value(&self) -> StoreResult<Value> {
        let val = self
            .cursor
            .value()
            .map_err(|e| cursor_error(IndexedDbError::from_request(e)))?;
        Ok(js_to_value(&val)?)
    }

    async fn advance(&mut self, count: u32) -> StoreResult<bool> {
        self.cursor
            .advance(count)
            .map_err(|e| cursor_error(IndexedDbError::from_request(e)))?;
        self.settle().await
    }

    async fn continue_(&mut self) -> StoreResult<bool> {
        self.cursor
            .continue_()
            .map_err(|e| cursor_error(IndexedDbError::from_request(e)))?;
        self.settle().await
    }
}
