//! Typed access to one collection
//!
//! Wraps a collection name and converts records through serde, so callers
//! work with their own types instead of raw JSON values.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::client::StorageClient;
use crate::config::Page;
use crate::engine::Backend;
use crate::error::StoreResult;
use crate::key::Key;

/// A collection whose records deserialize into `T`.
pub struct Collection<'a, B: Backend, T> {
    client: &'a StorageClient<B>,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, B: Backend, T> Collection<'a, B, T> {
    pub(crate) fn new(client: &'a StorageClient<B>, name: String) -> Self {
        Self {
            client,
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<B: Backend, T: Serialize + DeserializeOwned> Collection<'_, B, T> {
    pub async fn insert(&self, item: &T) -> StoreResult<Key> {
        let record = serde_json::to_value(item)?;
        self.client.insert(&self.name, &record).await
    }

    pub async fn update(&self, item: &T) -> StoreResult<Key> {
        let record = serde_json::to_value(item)?;
        self.client.update(&self.name, &record).await
    }

    pub async fn find_by_id(&self, key: impl Into<Key>) -> StoreResult<Option<T>> {
        match self.client.find_by_id(&self.name, key).await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    pub async fn find_paginated(&self, page: Page) -> StoreResult<Vec<T>> {
        self.client
            .find_paginated(&self.name, page)
            .await?
            .into_iter()
            .map(|record| serde_json::from_value(record).map_err(Into::into))
            .collect()
    }

    pub async fn delete(&self, key: impl Into<Key>) -> StoreResult<()> {
        self.client.delete(&self.name, key).await
    }

    pub async fn delete_all(&self) -> StoreResult<()> {
        self.client.delete_all(&self.name).await
    }

    pub async fn count(&self) -> StoreResult<usize> {
        self.client.count(&self.name).await
    }
}
