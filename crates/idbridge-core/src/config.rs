//! Database, schema and client configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Name and version of one logical storage instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub version: u32,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Check the name is non-empty and the version is at least 1.
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.is_empty() {
            return Err(StoreError::Config("database name is empty".into()));
        }
        if self.version == 0 {
            return Err(StoreError::Config(format!(
                "database '{}' version must be >= 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// One collection (object store) and the field holding its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    #[serde(rename = "keyPath", alias = "key_path")]
    pub key_path: String,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
        }
    }
}

/// Ordered set of collections, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    stores: Vec<StoreConfig>,
}

impl SchemaDescriptor {
    /// Build a descriptor, rejecting empty names, empty key paths and
    /// duplicate collection names.
    pub fn new(stores: Vec<StoreConfig>) -> StoreResult<Self> {
        let mut seen = HashSet::new();
        for store in &stores {
            if store.name.is_empty() {
                return Err(StoreError::Config("collection name is empty".into()));
            }
            if store.key_path.is_empty() {
                return Err(StoreError::Config(format!(
                    "collection '{}' has an empty key path",
                    store.name
                )));
            }
            if !seen.insert(store.name.as_str()) {
                return Err(StoreError::Config(format!(
                    "collection '{}' declared twice",
                    store.name
                )));
            }
        }
        Ok(Self { stores })
    }

    pub fn stores(&self) -> &[StoreConfig] {
        &self.stores
    }

    pub fn get(&self, name: &str) -> Option<&StoreConfig> {
        self.stores.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Everything needed to build and initialize a client.
///
/// This is the shape accepted by the browser bindings:
///
/// ```json
/// {
///   "database": { "name": "app", "version": 1 },
///   "stores": [{ "name": "users", "keyPath": "id" }],
///   "debug": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
    /// Trace every operation's inputs and outputs. Never changes results.
    #[serde(default)]
    pub debug: bool,
}

impl ClientConfig {
    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A window over a collection's natural key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

impl Page {
    /// Negative `skip` is clamped to zero.
    pub fn new(skip: i64, limit: u32) -> Self {
        let skip = skip.clamp(0, u32::MAX as i64) as u32;
        Self { skip, limit }
    }

    /// The first `limit` records.
    pub fn first(limit: u32) -> Self {
        Self { skip: 0, limit }
    }

    /// The window immediately after this one, with the same limit.
    pub fn next(&self) -> Self {
        Self {
            skip: self.skip.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps_negative_skip() {
        assert_eq!(Page::new(-4, 10), Page { skip: 0, limit: 10 });
        assert_eq!(Page::new(3, 10), Page { skip: 3, limit: 10 });
    }

    #[test]
    fn test_page_next() {
        assert_eq!(Page::new(5, 3).next(), Page::new(8, 3));
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let err = SchemaDescriptor::new(vec![
            StoreConfig::new("users", "id"),
            StoreConfig::new("users", "email"),
        ])
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_schema_rejects_empty_key_path() {
        let err = SchemaDescriptor::new(vec![StoreConfig::new("users", "")]).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_schema_keeps_order() {
        let schema = SchemaDescriptor::new(vec![
            StoreConfig::new("users", "id"),
            StoreConfig::new("orders", "orderId"),
        ])
        .unwrap();
        let names: Vec<&str> = schema.stores().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
        assert_eq!(schema.get("orders").unwrap().key_path, "orderId");
    }

    #[test]
    fn test_database_version_zero_rejected() {
        assert!(DatabaseConfig::new("app", 0).validate().is_err());
        assert!(DatabaseConfig::new("", 1).validate().is_err());
        assert!(DatabaseConfig::new("app", 1).validate().is_ok());
    }

    #[test]
    fn test_client_config_from_json() {
        let config = ClientConfig::from_json(
            r#"{"database":{"name":"app","version":2},"stores":[{"name":"users","keyPath":"id"}]}"#,
        )
        .unwrap();
        assert_eq!(config.database, DatabaseConfig::new("app", 2));
        assert_eq!(config.stores, vec![StoreConfig::new("users", "id")]);
        assert!(!config.debug);
    }
}
