//! Browser WASM bindings using wasm-bindgen
//!
//! Exposes the storage client to JavaScript. Records, keys and configs cross
//! the boundary as JSON strings; failures reject with a JS `Error` whose
//! `name` is the error kind (`NotInitialized`, `ConstraintViolation`, ...).
//!
//! ```js
//! await initStorage(JSON.stringify({
//!   database: { name: "app", version: 1 },
//!   stores: [{ name: "users", keyPath: "id" }],
//! }));
//! await insertRecord("users", JSON.stringify({ id: "u1", name: "Ada" }));
//! const page = JSON.parse(await findPaginated("users", 0, 10));
//! ```

use std::rc::Rc;

use idbridge_core::{ClientConfig, Key, Page, StorageClient, StoreError};
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::backend::IndexedDbBackend;

thread_local! {
    /// One client per WASM instance; operations fail with NotInitialized
    /// until init_storage succeeds.
    static CLIENT: Rc<StorageClient<IndexedDbBackend>> =
        Rc::new(StorageClient::new(IndexedDbBackend::new()));
}

fn client() -> Rc<StorageClient<IndexedDbBackend>> {
    CLIENT.with(Rc::clone)
}

/// Convert a StoreError into a JS Error named after its kind.
fn to_js(err: StoreError) -> JsValue {
    let js_err = js_sys::Error::new(&err.to_string());
    js_err.set_name(err.kind());
    js_err.into()
}

fn parse_record(json: &str) -> Result<Value, JsValue> {
    serde_json::from_str(json).map_err(|e| to_js(e.into()))
}

fn parse_key(json: &str) -> Result<Key, JsValue> {
    let value = parse_record(json)?;
    Key::try_from(&value).map_err(to_js)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| to_js(e.into()))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Whether this environment provides IndexedDB.
#[wasm_bindgen(js_name = isSupported)]
pub fn is_supported() -> bool {
    idbridge_core::Backend::is_available(&IndexedDbBackend::new())
}

/// Open the database described by `config_json` and run its migration.
///
/// Resolves to the JSON of the initialization outcome:
/// `{"name":"app","version":1,"setup":{"change":{...},"created":["users"]}}`
#[wasm_bindgen(js_name = initStorage)]
pub async fn init_storage(config_json: &str) -> Result<String, JsValue> {
    // Route Rust panics to console.error instead of "RuntimeError: unreachable"
    console_error_panic_hook::set_once();

    let config = ClientConfig::from_json(config_json).map_err(to_js)?;
    let initialized = client().initialize_with(&config).await.map_err(to_js)?;
    to_json(&initialized)
}

/// Resolves once initialization settles; rejects if it failed.
#[wasm_bindgen(js_name = storageReady)]
pub async fn storage_ready() -> Result<(), JsValue> {
    client().ready().await.map_err(to_js)
}

/// Current initialization state, e.g. `"ready"` or `"failed: ..."`.
#[wasm_bindgen(js_name = storageState)]
pub fn storage_state() -> String {
    client().state().to_string()
}

#[wasm_bindgen(js_name = setDebug)]
pub fn set_debug(debug: bool) {
    client().set_debug(debug);
}

/// Close the connection. Operations fail until the next init.
#[wasm_bindgen(js_name = closeStorage)]
pub fn close_storage() {
    client().close();
}

// ============================================================================
// Record operations
// ============================================================================

/// Insert a record. Resolves to the JSON of its key.
#[wasm_bindgen(js_name = insertRecord)]
pub async fn insert_record(store: &str, record_json: &str) -> Result<String, JsValue> {
    let record = parse_record(record_json)?;
    let key = client().insert(store, &record).await.map_err(to_js)?;
    to_json(&key.to_value())
}

/// Insert or replace a record. Resolves to the JSON of its key.
#[wasm_bindgen(js_name = updateRecord)]
pub async fn update_record(store: &str, record_json: &str) -> Result<String, JsValue> {
    let record = parse_record(record_json)?;
    let key = client().update(store, &record).await.map_err(to_js)?;
    to_json(&key.to_value())
}

/// Resolves to the record's JSON, or null if no record has that key.
#[wasm_bindgen(js_name = findById)]
pub async fn find_by_id(store: &str, key_json: &str) -> Result<Option<String>, JsValue> {
    let key = parse_key(key_json)?;
    match client().find_by_id(store, key).await.map_err(to_js)? {
        Some(record) => Ok(Some(to_json(&record)?)),
        None => Ok(None),
    }
}

/// Resolves to a JSON array of at most `limit` records after skipping `skip`.
///
/// A negative `skip` is treated as 0.
#[wasm_bindgen(js_name = findPaginated)]
pub async fn find_paginated(store: &str, skip: f64, limit: u32) -> Result<String, JsValue> {
    let page = Page::new(skip as i64, limit);
    let records = client().find_paginated(store, page).await.map_err(to_js)?;
    to_json(&records)
}

/// Delete by key. Deleting a missing key succeeds.
#[wasm_bindgen(js_name = deleteRecord)]
pub async fn delete_record(store: &str, key_json: &str) -> Result<(), JsValue> {
    let key = parse_key(key_json)?;
    client().delete(store, key).await.map_err(to_js)
}

#[wasm_bindgen(js_name = deleteAll)]
pub async fn delete_all(store: &str) -> Result<(), JsValue> {
    client().delete_all(store).await.map_err(to_js)
}

#[wasm_bindgen(js_name = countRecords)]
pub async fn count_records(store: &str) -> Result<u32, JsValue> {
    let count = client().count(store).await.map_err(to_js)?;
    Ok(count as u32)
}
