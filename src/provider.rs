//! Async data providers — the plumbing behind `LOAD JSON` and `CALL`
//! targets that need network I/O. Grounded in the teacher's async
//! `StorageBackend` trait shape (async-trait, `Result<T>` returns) but
//! pared down to the one operation FlowQuery's virtual catalog needs:
//! fetch a JSON document, return it as a [`Value`].

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::functions::from_serde_json;
use crate::model::Value;

/// Implemented by anything `CALL`/`LOAD JSON` can dispatch to.
#[async_trait]
pub trait AsyncProvider: Send + Sync {
    async fn fetch(&self, request: ProviderRequest) -> Result<Value>;
}

/// The resolved (post-evaluation) request a `LOAD JSON` clause issues.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub url: String,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
}

/// Built-in provider for `LOAD JSON FROM <url> [POST <body>] [HEADERS <map>]`.
/// GETs when `body` is absent, POSTs a JSON-encoded body otherwise — the
/// exact wire contract spec.md §6 names.
pub struct HttpJsonProvider {
    client: reqwest::Client,
}

impl Default for HttpJsonProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpJsonProvider {
    pub fn new() -> Self {
        HttpJsonProvider { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl AsyncProvider for HttpJsonProvider {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: ProviderRequest) -> Result<Value> {
        let mut builder = match &request.body {
            Some(body) => self
                .client
                .post(&request.url)
                .json(&crate::functions::to_serde_json(body)),
            None => self.client.get(&request.url),
        };
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|e| Error::ProviderError {
            source: request.url.clone(),
            cause: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(Error::ProviderError {
                source: request.url.clone(),
                cause: format!("HTTP {}", response.status()),
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| Error::ProviderError {
            source: request.url,
            cause: e.to_string(),
        })?;
        Ok(from_serde_json(&json))
    }
}
