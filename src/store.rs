//! Conversation store client
//!
//! A path-based document store over the Firebase realtime-database REST
//! API. The store exclusively owns durable state; the process re-reads on
//! every event and performs no cross-request coordination (last write
//! wins).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Result};

/// Path-based document store operations
///
/// `key = None` targets the whole document at `path`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document; `None` when nothing is stored at the path
    async fn get(&self, path: &str, key: Option<&str>) -> Result<Option<Value>>;

    /// Write a document, replacing any existing value
    async fn put(&self, path: &str, key: Option<&str>, value: Value) -> Result<()>;

    /// Delete a document
    async fn delete(&self, path: &str, key: Option<&str>) -> Result<()>;
}

/// Fire-and-forget write; failures are logged, never surfaced
///
/// This is the `put_async` store operation: history persistence must not
/// block or fail the reply path.
pub fn put_detached(
    store: &Arc<dyn DocumentStore>,
    path: impl Into<String>,
    key: Option<String>,
    value: Value,
) {
    let store = Arc::clone(store);
    let path = path.into();
    tokio::spawn(async move {
        if let Err(e) = store.put(&path, key.as_deref(), value).await {
            tracing::warn!(path = %path, error = %e, "detached store write failed");
        }
    });
}

/// Firebase realtime-database REST client
pub struct FirebaseStore {
    base_url: String,
    client: reqwest::Client,
}

impl FirebaseStore {
    /// Create a store client for the given database base URL
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build the REST URL for a document
    fn document_url(&self, path: &str, key: Option<&str>) -> String {
        let path = path.trim_matches('/');
        match key {
            Some(key) => format!("{}/{path}/{key}.json", self.base_url),
            None => format!("{}/{path}.json", self.base_url),
        }
    }
}

#[async_trait]
impl DocumentStore for FirebaseStore {
    async fn get(&self, path: &str, key: Option<&str>) -> Result<Option<Value>> {
        let url = self.document_url(path, key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Store(format!("get failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Store(format!("get {path}: {}", response.status())));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::Store(format!("get {path}: bad body: {e}")))?;

        // Firebase returns literal null for missing documents
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(value))
        }
    }

    async fn put(&self, path: &str, key: Option<&str>, value: Value) -> Result<()> {
        let url = self.document_url(path, key);
        let response = self
            .client
            .put(&url)
            .json(&value)
            .send()
            .await
            .map_err(|e| Error::Store(format!("put failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Store(format!("put {path}: {}", response.status())));
        }
        Ok(())
    }

    async fn delete(&self, path: &str, key: Option<&str>) -> Result<()> {
        let url = self.document_url(path, key);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| Error::Store(format!("delete failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Store(format!(
                "delete {path}: {}",
                response.status()
            )));
        }
        Ok(())
    }
}
