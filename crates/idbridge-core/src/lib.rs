//! idbridge core
//!
//! An asynchronous data-access facade over a transactional, object-store
//! based key/value engine such as the browser's IndexedDB. Application code
//! gets schema setup, insert, point lookup, paginated scan, update, delete,
//! clear and count as plain `async fn`s with typed errors, instead of the
//! engine's request/cursor callback protocol.
//!
//! The crate is engine-agnostic and runs identically in browser (WASM) and
//! native builds. Engines implement the traits in [`engine`]; this crate
//! ships [`MemoryBackend`], and `idbridge-indexeddb` provides IndexedDB.
//!
//! # Example
//!
//! ```rust
//! use idbridge_core::{DatabaseConfig, MemoryBackend, Page, StorageClient, StoreConfig};
//! use serde_json::json;
//!
//! # async fn run() -> idbridge_core::StoreResult<()> {
//! let client = StorageClient::new(MemoryBackend::new());
//! client
//!     .initialize(DatabaseConfig::new("app", 1), vec![StoreConfig::new("users", "id")])
//!     .await?;
//!
//! client.insert("users", &json!({"id": 1, "name": "Ann"})).await?;
//! let page = client.find_paginated("users", Page::first(10)).await?;
//! assert_eq!(page.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod client;
pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod key;
pub mod logging;
pub mod memory;
pub mod migrate;
pub mod scan;
pub mod state;

// Re-export main types at crate root
pub use cell::{HandleCell, HandleSubscription};
pub use client::{Initialized, StorageClient};
pub use collection::Collection;
pub use config::{ClientConfig, DatabaseConfig, Page, SchemaDescriptor, StoreConfig};
pub use engine::{
    Backend, Connection, Cursor, Opened, UpgradeReport, UpgradeTransaction, VersionChange,
};
pub use error::{StoreError, StoreResult};
pub use key::Key;
pub use memory::{MemoryBackend, MemoryConnection, MemoryCursor};
pub use migrate::UpgradeHook;
pub use state::InitState;
