//! IndexedDB engine for idbridge (browser WASM)
//!
//! Implements the `idbridge_core` engine traits on top of the browser's
//! IndexedDB, and exposes the resulting `StorageClient` to JavaScript.
//!
//! Each request runs in its own transaction scoped to one object store.
//! Writes resolve only after their transaction commits. Migrations run
//! inside the `versionchange` transaction of `indexedDB.open`.
//!
//! # Example
//!
//! ```rust,ignore
//! use idbridge_core::{DatabaseConfig, Page, StorageClient, StoreConfig};
//! use idbridge_indexeddb::IndexedDbBackend;
//!
//! let client = StorageClient::new(IndexedDbBackend::new());
//! client
//!     .initialize(DatabaseConfig::new("app", 1), vec![StoreConfig::new("users", "id")])
//!     .await?;
//!
//! client.insert("users", &serde_json::json!({"id": "u1"})).await?;
//! let page = client.find_paginated("users", Page::first(10)).await?;
//! ```

pub mod backend;
pub mod browser;
pub mod convert;
pub mod error;
pub mod idb;

pub use backend::{IndexedDbBackend, IndexedDbConnection, IndexedDbCursor};
pub use error::{IndexedDbError, Result};
