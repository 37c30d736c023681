//! Byte-level store access.
//!
//! The remote store is consumed as a read-only key → bytes capability; the
//! array client layers chunked-array semantics on top. Key absence is a
//! normal outcome (`Ok(None)`), never an error, so the client can tell a
//! missing array apart from an unreachable store.

use std::future::Future;

use log::debug;

use crate::error::TransportError;

// ---------------------------------------------------------------------------
// StoreTransport
// ---------------------------------------------------------------------------

/// Read-only access to the remote object store.
///
/// Implementations must be safe for unbounded concurrent reads through a
/// shared reference; the session fans out per-unit fetches against one
/// transport instance.
pub trait StoreTransport {
    /// Fetch the object at `key`, or `None` if the store has no such key.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>>;
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// HTTP(S) object store: keys are resolved relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl StoreTransport for HttpTransport {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TransportError> {
        let url = format!("{}/{}", self.base_url, key);
        debug!("GET {url}");

        let failed = |reason: String| TransportError {
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }
}
