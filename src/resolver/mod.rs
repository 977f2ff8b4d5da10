//! Remote resolution of component definitions.
//!
//! A single round trip: given a reference and its tag's endpoint, fetch
//!
//! ```text
//! GET {api}{?|&}namespace={namespace}&version={version}
//! ```
//!
//! and decode `{ "data": { "runtime": "...", "deps": [{ "namespace", "version" }] } }`.
//! Any status other than 200 is a failure, as is a transport error, a timeout or
//! a body that is not this envelope. There is no retry and no caching here; the
//! [`materializer`](crate::materializer) decides what a failure means.
//!
//! The [`ComponentFetcher`] trait is the seam tests use to script responses
//! without a network.

use crate::component::{ComponentReference, DependencyDescriptor};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Why a fetch did not produce a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The endpoint answered with a status other than 200
    #[error("endpoint returned HTTP {0}")]
    Status(u16),
    /// The request could not be completed
    #[error("request failed: {0}")]
    Transport(String),
    /// The 200 body is not a component envelope
    #[error("invalid response body: {0}")]
    Decode(String),
    /// The request did not finish in time
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// One fetch to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The component to fetch
    pub reference: ComponentReference,
    /// Its derived identifier, for logging
    pub identifier: String,
    /// The tag's configured endpoint
    pub api: Url,
}

impl FetchRequest {
    /// The full request URL with `namespace` and `version` query parameters.
    pub fn url(&self) -> Url {
        build_request_url(&self.api, &self.reference.namespace, &self.reference.version)
    }
}

/// Appends `namespace` and `version` to `api`, keeping any existing query.
pub fn build_request_url(api: &Url, namespace: &str, version: &str) -> Url {
    let mut url = api.clone();
    url.query_pairs_mut().append_pair("namespace", namespace).append_pair("version", version);
    url
}

/// How a runtime string is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Function-style source, embedded into the generated module
    Source,
    /// Pre-compiled module code, written to a companion file and imported
    Compiled,
}

/// A fetched component definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPayload {
    /// Runtime code as served
    pub runtime: String,
    /// Declared sub-dependencies, in order
    pub deps: Vec<DependencyDescriptor>,
}

#[derive(Deserialize)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    runtime: String,
    #[serde(default)]
    deps: serde_json::Value,
}

impl ComponentPayload {
    /// Creates a payload.
    pub fn new(runtime: impl Into<String>, deps: Vec<DependencyDescriptor>) -> Self {
        Self {
            runtime: runtime.into(),
            deps,
        }
    }

    /// Decodes a response body.
    ///
    /// `deps` that is absent or not an array counts as empty; array items
    /// without string `namespace` and `version` fields are skipped.
    pub fn from_body(body: &[u8]) -> Result<Self, FetchError> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;

        let deps = match envelope.data.deps {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<DependencyDescriptor>(item) {
                    Ok(dep) => Some(dep),
                    Err(e) => {
                        tracing::warn!("Skipping invalid dependency descriptor: {e}");
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            runtime: envelope.data.runtime,
            deps,
        })
    }

    /// The runtime with surrounding whitespace removed.
    pub fn trimmed_runtime(&self) -> &str {
        self.runtime.trim()
    }

    /// Source when the trimmed runtime starts with `function`, compiled otherwise.
    pub fn runtime_kind(&self) -> RuntimeKind {
        if self.trimmed_runtime().starts_with("function") {
            RuntimeKind::Source
        } else {
            RuntimeKind::Compiled
        }
    }
}

/// Fetches component definitions.
#[async_trait]
pub trait ComponentFetcher: Send + Sync {
    /// Performs one fetch.
    async fn fetch(&self, request: &FetchRequest) -> Result<ComponentPayload, FetchError>;
}

/// [`ComponentFetcher`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloudcom/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            timeout,
        })
    }
}

#[async_trait]
impl ComponentFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ComponentPayload, FetchError> {
        let url = request.url();
        tracing::debug!("GET {url} for {}", request.identifier);

        let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        ComponentPayload::from_body(&body)
    }
}

impl HttpFetcher {
    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}
