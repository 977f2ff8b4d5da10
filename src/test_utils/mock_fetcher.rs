//! Scripted [`ComponentFetcher`] for resolver-free tests.

use crate::component::DependencyDescriptor;
use crate::resolver::{ComponentFetcher, ComponentPayload, FetchError, FetchRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Scripted {
    Payload(ComponentPayload),
    Failure(FetchError),
}

/// A fetcher answering from a table keyed by `(namespace, version)`.
///
/// Unscripted components answer with HTTP 404. Every call is recorded.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<(String, String), Scripted>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockFetcher {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `namespace@version` with `runtime` and `deps`.
    pub fn with_payload(
        mut self,
        namespace: &str,
        version: &str,
        runtime: &str,
        deps: &[(&str, &str)],
    ) -> Self {
        let deps = deps.iter().map(|(ns, ver)| DependencyDescriptor::new(*ns, *ver)).collect();
        self.responses.insert(
            (namespace.to_string(), version.to_string()),
            Scripted::Payload(ComponentPayload::new(runtime, deps)),
        );
        self
    }

    /// Answers `namespace@version` with a non-200 status.
    pub fn with_status(self, namespace: &str, version: &str, status: u16) -> Self {
        self.with_failure(namespace, version, FetchError::Status(status))
    }

    /// Answers `namespace@version` with `error`.
    pub fn with_failure(mut self, namespace: &str, version: &str, error: FetchError) -> Self {
        self.responses
            .insert((namespace.to_string(), version.to_string()), Scripted::Failure(error));
        self
    }

    /// Delays every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Total number of fetches.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of fetches of `namespace@version`.
    pub fn calls_for(&self, namespace: &str, version: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(ns, ver)| ns == namespace && ver == version)
            .count()
    }
}

#[async_trait]
impl ComponentFetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ComponentPayload, FetchError> {
        let key = (request.reference.namespace.clone(), request.reference.version.clone());
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(key.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.responses.get(&key) {
            Some(Scripted::Payload(payload)) => Ok(payload.clone()),
            Some(Scripted::Failure(error)) => Err(error.clone()),
            None => Err(FetchError::Status(404)),
        }
    }
}
