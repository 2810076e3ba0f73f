//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`.

use std::cell::RefCell;
use std::rc::Rc;

use idbridge_core::{StoreError, UpgradeHook, UpgradeReport, UpgradeTransaction, VersionChange};
use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    IdbDatabase, IdbFactory, IdbObjectStore, IdbOpenDbRequest, IdbRequest, IdbTransaction,
    IdbTransactionMode, IdbVersionChangeEvent,
};

use crate::error::{dom_error, IndexedDbError, Result};

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;

/// Type alias for upgrade closure to reduce complexity
type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(IdbVersionChangeEvent)>>>>;

/// What the upgrade callback produced, read back once the open settles
type UpgradeOutcome = Rc<RefCell<Option<std::result::Result<UpgradeReport, StoreError>>>>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Success/error handlers attached to a request or transaction.
///
/// Owned by the awaiting future. Dropping it detaches the handlers first,
/// so a handler is never invoked after its closure is freed.
struct Handlers {
    detach: Box<dyn Fn()>,
    _closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>>,
}

impl Drop for Handlers {
    fn drop(&mut self) {
        (self.detach)();
    }
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's result.
///
/// Rejects with the request's DOMException so callers can classify it by name.
fn request_to_promise(req: &IdbRequest) -> (Promise, Handlers) {
    let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> = Rc::new(RefCell::new(None));
    let req_success = req.clone();
    let req_error = req.clone();
    let closures_for_promise = closures.clone();

    let promise = Promise::new(&mut move |resolve, reject| {
        let req_s = req_success.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = match req_e.error() {
                Ok(Some(e)) => JsValue::from(e),
                _ => JsValue::from_str("unknown IDB error"),
            };
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both closures alive until the awaiting future drops the handlers
        *closures_for_promise.borrow_mut() = Some((on_success, on_error));
    });

    let req = req.clone();
    let handlers = Handlers {
        detach: Box::new(move || {
            req.set_onsuccess(None);
            req.set_onerror(None);
        }),
        _closures: closures,
    };
    (promise, handlers)
}

/// Convert an IdbTransaction completion into a JS Promise.
fn transaction_to_promise(tx: &IdbTransaction) -> (Promise, Handlers) {
    let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> = Rc::new(RefCell::new(None));
    let tx_complete = tx.clone();
    let tx_error = tx.clone();
    let closures_for_promise = closures.clone();

    let promise = Promise::new(&mut move |resolve, reject| {
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx_error.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_e
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_error.set_onabort(Some(on_error.as_ref().unchecked_ref()));

        *closures_for_promise.borrow_mut() = Some((on_complete, on_error));
    });

    let tx = tx.clone();
    let handlers = Handlers {
        detach: Box::new(move || {
            tx.set_oncomplete(None);
            tx.set_onerror(None);
            tx.set_onabort(None);
        }),
        _closures: closures,
    };
    (promise, handlers)
}

/// Collection management inside a `versionchange` transaction.
struct IdbUpgrade<'a> {
    db: &'a IdbDatabase,
}

impl UpgradeTransaction for IdbUpgrade<'_> {
    fn store_names(&self) -> Vec<String> {
        let names = self.db.object_store_names();
        (0..names.length()).filter_map(|i| names.get(i)).collect()
    }

    fn create_store(&mut self, name: &str, key_path: &str) -> idbridge_core::StoreResult<()> {
        let params = web_sys::IdbObjectStoreParameters::new();
        js_sys::Reflect::set(&params, &"keyPath".into(), &key_path.into())
            .map_err(|e| StoreError::from(IndexedDbError::JsValue(format!("{:?}", e))))?;

        self.db
            .create_object_store_with_optional_parameters(name, &params)
            .map(|_| ())
            .map_err(|e| StoreError::from(IndexedDbError::from_request(e)))
    }
}

/// Run the hook inside the upgrade event.
fn run_upgrade(
    event: &IdbVersionChangeEvent,
    hook: &UpgradeHook,
    change: VersionChange,
) -> std::result::Result<UpgradeReport, StoreError> {
    let req: IdbOpenDbRequest = event
        .target()
        .ok_or_else(|| StoreError::Connection("upgrade event has no target".into()))?
        .unchecked_into();
    let db: IdbDatabase = req
        .result()
        .map_err(|e| StoreError::Connection(format!("no database on upgrade: {:?}", e)))?
        .unchecked_into();

    let created = hook.run(&mut IdbUpgrade { db: &db }, change)?;
    Ok(UpgradeReport { change, created })
}

/// Abort the `versionchange` transaction so nothing from the upgrade persists.
fn abort_upgrade(event: &IdbVersionChangeEvent) {
    let tx = event
        .target()
        .map(|t| t.unchecked_into::<IdbOpenDbRequest>())
        .and_then(|req| req.transaction());
    if let Some(tx) = tx {
        if let Err(e) = tx.abort() {
            tracing::error!("failed to abort upgrade transaction: {:?}", e);
        }
    }
}

/// Open (or create) a database, running `hook` if `version` is newer than
/// the stored one.
///
/// Resolves only after the upgrade transaction (if any) has committed.
pub async fn open_database(
    db_name: &str,
    version: u32,
    hook: UpgradeHook,
) -> Result<(IdbDatabase, Option<UpgradeReport>)> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(db_name, version)
        .map_err(|e| IndexedDbError::Open(format!("{:?}", e)))?;

    let outcome: UpgradeOutcome = Rc::new(RefCell::new(None));

    // Store upgrade closure to manage its lifetime without leaking
    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let upgrade_closure_for_drop = upgrade_closure.clone();

    let outcome_for_upgrade = outcome.clone();
    let on_upgrade = Closure::wrap(Box::new(move |event: IdbVersionChangeEvent| {
        let change = VersionChange {
            old_version: event.old_version() as u32,
            new_version: event.new_version().map(|v| v as u32).unwrap_or(version),
        };
        let result = run_upgrade(&event, &hook, change);
        if let Err(e) = &result {
            tracing::error!("upgrade to v{} failed: {}", change.new_version, e);
            abort_upgrade(&event);
        }
        *outcome_for_upgrade.borrow_mut() = Some(result);
    }) as Box<dyn FnMut(IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    // Store closure to keep it alive during the open request
    *upgrade_closure.borrow_mut() = Some(on_upgrade);

    let name_for_blocked = db_name.to_string();
    let on_blocked = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        tracing::warn!(
            "open of '{}' v{} blocked by another open connection",
            name_for_blocked,
            version
        );
    }) as Box<dyn FnMut(web_sys::Event)>);
    open_req.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));

    // Await the open request via promise
    let (open_promise, handlers) = request_to_promise(open_req.unchecked_ref());
    let result = wasm_bindgen_futures::JsFuture::from(open_promise).await;
    drop(handlers);

    // Clean up upgrade closures now that open is complete
    open_req.set_onupgradeneeded(None);
    open_req.set_onblocked(None);
    *upgrade_closure_for_drop.borrow_mut() = None;
    drop(on_blocked);

    let upgrade = outcome.borrow_mut().take();
    let db_val = match (result, upgrade) {
        (Err(_), Some(Err(e))) => return Err(IndexedDbError::Upgrade(e.to_string())),
        (Err(e), _) => {
            let (name, message) = dom_error(&e);
            return Err(IndexedDbError::Open(format!("{}: {}", name, message)));
        }
        (Ok(val), Some(Err(e))) => {
            // The engine committed despite the hook failing; refuse the handle
            if let Ok(db) = val.dyn_into::<IdbDatabase>() {
                db.close();
            }
            return Err(IndexedDbError::Upgrade(e.to_string()));
        }
        (Ok(val), upgrade) => (val, upgrade.and_then(|r| r.ok())),
    };

    let (val, report) = db_val;
    let db = val
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))?;
    Ok((db, report))
}

/// Start a transaction on one object store.
pub fn begin_transaction(
    db: &IdbDatabase,
    store_name: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    let tx = db
        .transaction_with_str_and_mode(store_name, mode)
        .map_err(IndexedDbError::from_request)?;
    let store = tx
        .object_store(store_name)
        .map_err(IndexedDbError::from_request)?;
    Ok((tx, store))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let (promise, _handlers) = request_to_promise(req);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from_request)
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let (promise, _handlers) = transaction_to_promise(tx);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| {
            let (name, message) = dom_error(&e);
            IndexedDbError::Transaction(format!("{}: {}", name, message))
        })?;
    Ok(())
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {:?}", e)))?;
    await_request(req.unchecked_ref()).await?;
    Ok(())
}
