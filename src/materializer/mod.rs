//! Dependency materialization: turning references into artifacts on disk.
//!
//! For every top-level reference the materializer walks the component's
//! dependency graph, fetching each node at most once per [`Materializer`] and
//! writing one artifact per identity. Per node:
//!
//! 1. A cache entry with `success = true` whose artifact still exists is a hit:
//!    no fetch, recurse into the cached `deps`.
//! 2. Otherwise the component is fetched. A failure writes the error artifact
//!    and ends the branch.
//! 3. A fetched dependency writes its artifact, is marked successful and its
//!    `deps` are visited. A fetched top-level component visits its `deps` first
//!    and writes its entry artifact last, once every node below it has been
//!    visited, so the embedded registry holds the whole flattened subtree.
//!
//! Siblings are visited concurrently. Fetches share a semaphore, each is bounded
//! by a timeout, and nothing here returns an error: every failure degrades to a
//! fallback artifact and a count in the [`MaterializeReport`].
//!
//! # In-flight guard
//!
//! Each key has two [`Gates`] entries. The node gate is closed by the first
//! task to see the key and opens as soon as the node's own artifact is handled;
//! later tasks wait on it and then leave the node alone. The subtree gate opens
//! once the node's dependencies have been visited too. Only entry artifacts
//! wait on subtree gates, and only after their own subtree gate is open, while
//! node gates are never held across a wait, so tasks never wait on each other
//! in a circle.
//!
//! # Cycles
//!
//! Every branch carries the keys of its ancestors. A dependency that is already
//! an ancestor is reported and not visited again.

use crate::codegen::{CodeGenerator, GeneratedFile, RegistryEntry};
use crate::component::{ComponentIdentity, ComponentReference, DependencyDescriptor, IdentityDeriver};
use crate::core::CloudcomError;
use crate::resolver::{ComponentFetcher, ComponentPayload, FetchError, FetchRequest};
use crate::scanner::{ScannedReference, TagRegistry};
use crate::store::{CacheKey, ComponentCache};
use crate::utils::fs::write_all_if_changed;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, join_all};
use std::collections::HashSet;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// One node of the worklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Tag of the top-level reference this node descends from
    pub owning_tag: String,
    /// The component
    pub reference: ComponentReference,
    /// Its artifact identity
    pub identity: ComponentIdentity,
    /// Whether the node is a sub-dependency rather than a top-level reference
    pub is_child: bool,
}

impl WorkItem {
    /// A top-level node for a scanned reference.
    pub fn top_level(scanned: &ScannedReference) -> Self {
        Self {
            owning_tag: scanned.reference.tag_name.clone(),
            reference: scanned.reference.clone(),
            identity: scanned.identity.clone(),
            is_child: false,
        }
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.owning_tag, &self.identity.identifier)
    }
}

/// Counts from one materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Components fetched and written
    pub fetched: usize,
    /// Components skipped thanks to the cache
    pub cache_hits: usize,
    /// Components that degraded to an error artifact
    pub failed: usize,
    /// Dependency edges pointing back at an ancestor
    pub cycles: usize,
    /// Artifacts that could not be written
    pub write_errors: usize,
}

impl MaterializeReport {
    /// Whether anything went wrong.
    pub fn has_problems(&self) -> bool {
        self.failed > 0 || self.cycles > 0 || self.write_errors > 0
    }
}

impl AddAssign for MaterializeReport {
    fn add_assign(&mut self, other: Self) {
        self.fetched += other.fetched;
        self.cache_hits += other.cache_hits;
        self.failed += other.failed;
        self.cycles += other.cycles;
        self.write_errors += other.write_errors;
    }
}

impl fmt::Display for MaterializeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched, {} cached, {} failed, {} cycles",
            self.fetched, self.cache_hits, self.failed, self.cycles
        )?;
        if self.write_errors > 0 {
            write!(f, ", {} write errors", self.write_errors)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RunStats {
    fetched: AtomicUsize,
    cache_hits: AtomicUsize,
    failed: AtomicUsize,
    cycles: AtomicUsize,
    write_errors: AtomicUsize,
}

impl RunStats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn report(&self) -> MaterializeReport {
        MaterializeReport {
            fetched: self.fetched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
enum GateState {
    Pending(Arc<Notify>),
    Open,
}

/// One-shot per-key gates: closed once, opened for good when the guard drops.
#[derive(Debug, Default)]
struct Gates {
    states: DashMap<CacheKey, GateState>,
}

impl Gates {
    /// Closes the gate for `key` unless it was closed before.
    fn try_close(&self, key: &CacheKey) -> Option<GateGuard<'_>> {
        match self.states.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(GateState::Pending(Arc::new(Notify::new())));
                Some(GateGuard {
                    gates: self,
                    key: key.clone(),
                })
            }
        }
    }

    /// Waits until the gate for `key` is open. A gate never closed counts as open.
    async fn wait(&self, key: &CacheKey) {
        let notify = match self.states.get(key).as_deref() {
            Some(GateState::Pending(notify)) => Arc::clone(notify),
            Some(GateState::Open) | None => return,
        };

        let notified = notify.notified();
        tokio::pin!(notified);
        // Registered before the state is checked again so an open in
        // between still wakes us
        notified.as_mut().enable();
        if matches!(self.states.get(key).as_deref(), Some(GateState::Open)) {
            return;
        }
        notified.await;
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}

/// Opens its gate when dropped, waking every waiter.
struct GateGuard<'a> {
    gates: &'a Gates,
    key: CacheKey,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if let Some(GateState::Pending(notify)) =
            self.gates.states.insert(self.key.clone(), GateState::Open)
        {
            notify.notify_waiters();
        }
    }
}

/// Materializes references of one dialect.
pub struct Materializer {
    fetcher: Arc<dyn ComponentFetcher>,
    cache: ComponentCache,
    generator: CodeGenerator,
    deriver: IdentityDeriver,
    registry: TagRegistry,
    fetch_slots: Arc<Semaphore>,
    fetch_timeout: Duration,
    nodes: Gates,
    subtrees: Gates,
    known_deps: DashMap<CacheKey, Vec<DependencyDescriptor>>,
}

impl fmt::Debug for Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Materializer")
            .field("dialect", &self.generator.dialect())
            .field("component_dir", &self.deriver.component_dir())
            .field("fetch_timeout", &self.fetch_timeout)
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl Materializer {
    /// Creates a materializer.
    ///
    /// `fetch_slots` bounds concurrent fetches and may be shared with other
    /// materializers; `fetch_timeout` bounds each fetch.
    pub fn new(
        fetcher: Arc<dyn ComponentFetcher>,
        cache: ComponentCache,
        generator: CodeGenerator,
        deriver: IdentityDeriver,
        registry: TagRegistry,
        fetch_slots: Arc<Semaphore>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache,
            generator,
            deriver,
            registry,
            fetch_slots,
            fetch_timeout,
            nodes: Gates::default(),
            subtrees: Gates::default(),
            known_deps: DashMap::new(),
        }
    }

    /// The code generator.
    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    /// The identity deriver.
    pub fn deriver(&self) -> &IdentityDeriver {
        &self.deriver
    }

    /// The configured tags.
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Materializes every reference and its dependency closure.
    pub async fn materialize(&self, references: &[ScannedReference]) -> MaterializeReport {
        let stats = RunStats::default();

        let branches =
            references.iter().map(|scanned| self.visit(WorkItem::top_level(scanned), Vec::new(), &stats));
        join_all(branches).await;

        let report = stats.report();
        tracing::debug!("Materialized {} references: {report}", references.len());
        report
    }

    fn visit<'a>(
        &'a self,
        item: WorkItem,
        ancestors: Vec<CacheKey>,
        stats: &'a RunStats,
    ) -> BoxFuture<'a, ()> {
        async move {
            let key = item.cache_key();
            let Some(claim) = self.claim(&key).await else {
                return;
            };
            let subtree = self.subtrees.try_close(&key);

            self.cache.ensure(&key);

            if let Some(entry) = self.cache.get(&key)
                && entry.success
            {
                if tokio::fs::try_exists(&item.identity.path).await.unwrap_or(false) {
                    tracing::info!("Cache hit for {}", item.reference);
                    RunStats::bump(&stats.cache_hits);
                    self.known_deps.insert(key.clone(), entry.deps.clone());
                    drop(claim);
                    self.visit_deps(&item, &entry.deps, ancestors, stats).await;
                    return;
                }

                tracing::warn!(
                    "Cache lists {} as materialized but {} is missing; fetching again",
                    item.reference,
                    item.identity.path.display()
                );
            }

            let payload = match self.fetch(&item).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {e}", item.reference);
                    RunStats::bump(&stats.failed);
                    self.write_error_artifact(&item, stats).await;
                    return;
                }
            };

            self.known_deps.insert(key.clone(), payload.deps.clone());

            if item.is_child {
                let registry = self.direct_registry(&item, &payload.deps);
                let written = self
                    .generator
                    .dependency_files(
                        &item.identity,
                        &self.deriver.companion_path(&item.identity),
                        &payload,
                        &registry,
                    )
                    .map(|files| self.write(files, &item, stats));
                self.settle_fetched(&key, &item, &payload, written, stats).await;
                drop(claim);
                self.visit_deps(&item, &payload.deps, ancestors, stats).await;
            } else {
                drop(claim);
                self.visit_deps(&item, &payload.deps, ancestors, stats).await;
                drop(subtree);

                let registry = self.flattened_registry(&item, &payload.deps).await;
                let written = self
                    .generator
                    .entry_files(
                        &item.reference,
                        &item.identity,
                        &self.deriver.companion_path(&item.identity),
                        &payload,
                        &registry,
                    )
                    .map(|files| self.write(files, &item, stats));
                self.settle_fetched(&key, &item, &payload, written, stats).await;
            }
        }
        .boxed()
    }

    /// Claims `key`, or waits for the task holding it.
    ///
    /// Returns `None` when the node was handled by another task.
    async fn claim(&self, key: &CacheKey) -> Option<GateGuard<'_>> {
        if let Some(guard) = self.nodes.try_close(key) {
            return Some(guard);
        }

        tracing::debug!("Waiting for in-flight {}", key.identifier);
        self.nodes.wait(key).await;
        None
    }

    async fn fetch(&self, item: &WorkItem) -> Result<ComponentPayload, FetchError> {
        let Some(spec) = self.registry.get(&item.owning_tag) else {
            return Err(FetchError::Transport(format!(
                "tag '{}' has no configured endpoint",
                item.owning_tag
            )));
        };

        let request = FetchRequest {
            reference: item.reference.clone(),
            identifier: item.identity.identifier.clone(),
            api: spec.api.clone(),
        };

        let _permit = self
            .fetch_slots
            .acquire()
            .await
            .map_err(|_| FetchError::Transport("fetch pool closed".to_string()))?;

        tracing::info!("Fetching {}", item.reference);
        match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(&request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout)),
        }
    }

    async fn settle_fetched(
        &self,
        key: &CacheKey,
        item: &WorkItem,
        payload: &ComponentPayload,
        written: anyhow::Result<BoxFuture<'_, bool>>,
        stats: &RunStats,
    ) {
        let ok = match written {
            Ok(write) => write.await,
            Err(e) => {
                tracing::error!("Failed to generate artifact for {}: {e:#}", item.reference);
                RunStats::bump(&stats.write_errors);
                false
            }
        };

        if ok {
            self.cache.record_success(key, payload.deps.clone());
            RunStats::bump(&stats.fetched);
        }
    }

    fn write<'s>(
        &'s self,
        files: Vec<GeneratedFile>,
        item: &WorkItem,
        stats: &'s RunStats,
    ) -> BoxFuture<'s, bool> {
        let reference = item.reference.clone();
        let identity = item.identity.clone();
        async move {
            let files = files.into_iter().map(|f| (f.path, f.content)).collect();
            match write_all_if_changed(files).await {
                Ok(written) => {
                    tracing::debug!("Wrote {written} file(s) for {reference}");
                    true
                }
                Err(e) => {
                    let error = CloudcomError::ArtifactWriteFailed {
                        identifier: identity.identifier,
                        path: identity.path.display().to_string(),
                        reason: format!("{e:#}"),
                    };
                    tracing::error!("{error} for {reference}: {e:#}");
                    RunStats::bump(&stats.write_errors);
                    false
                }
            }
        }
        .boxed()
    }

    async fn write_error_artifact(&self, item: &WorkItem, stats: &RunStats) {
        match self.generator.error_file(&item.reference, &item.identity) {
            Ok(file) => {
                self.write(vec![file], item, stats).await;
            }
            Err(e) => {
                tracing::error!("Failed to generate error artifact for {}: {e:#}", item.reference);
                RunStats::bump(&stats.write_errors);
            }
        }
    }

    async fn visit_deps(
        &self,
        item: &WorkItem,
        deps: &[DependencyDescriptor],
        mut ancestors: Vec<CacheKey>,
        stats: &RunStats,
    ) {
        if deps.is_empty() {
            return;
        }

        ancestors.push(item.cache_key());

        let mut children = Vec::with_capacity(deps.len());
        for dep in deps {
            let reference = item.reference.child(dep);
            let identity = self.deriver.derive_reference(&reference);
            let child = WorkItem {
                owning_tag: item.owning_tag.clone(),
                reference,
                identity,
                is_child: true,
            };

            if ancestors.contains(&child.cache_key()) {
                tracing::warn!(
                    "Dependency cycle: {} depends on its ancestor {}",
                    item.reference,
                    child.reference
                );
                RunStats::bump(&stats.cycles);
                continue;
            }

            children.push(self.visit(child, ancestors.clone(), stats));
        }

        join_all(children).await;
    }

    fn child_entry(
        &self,
        parent: &ComponentReference,
        dep: &DependencyDescriptor,
    ) -> (ComponentReference, CacheKey, RegistryEntry) {
        let reference = parent.child(dep);
        let identity = self.deriver.derive_reference(&reference);
        let key = CacheKey::new(&reference.tag_name, &identity.identifier);
        let entry = RegistryEntry::new(&reference, &identity);
        (reference, key, entry)
    }

    /// Registrations of the direct dependencies, deduplicated.
    fn direct_registry(&self, item: &WorkItem, deps: &[DependencyDescriptor]) -> Vec<RegistryEntry> {
        let mut seen = HashSet::new();
        deps.iter()
            .map(|dep| self.child_entry(&item.reference, dep))
            .filter(|(_, key, _)| seen.insert(key.clone()))
            .map(|(_, _, entry)| entry)
            .collect()
    }

    /// Registrations of every direct and transitive dependency, depth-first
    /// in declaration order.
    ///
    /// Waits for each node's subtree to be visited before reading its
    /// dependencies, so nodes visited by a concurrent branch are complete too.
    async fn flattened_registry(
        &self,
        item: &WorkItem,
        deps: &[DependencyDescriptor],
    ) -> Vec<RegistryEntry> {
        let mut seen = HashSet::from([item.cache_key()]);
        let mut registry = Vec::new();
        let mut stack: Vec<(ComponentReference, DependencyDescriptor)> =
            deps.iter().rev().map(|dep| (item.reference.clone(), dep.clone())).collect();

        while let Some((parent, dep)) = stack.pop() {
            let (reference, key, entry) = self.child_entry(&parent, &dep);
            if !seen.insert(key.clone()) {
                continue;
            }
            registry.push(entry);

            self.subtrees.wait(&key).await;
            let Some(children) = self.known_deps.get(&key).map(|deps| deps.value().clone()) else {
                continue;
            };
            stack.extend(children.into_iter().rev().map(|child| (reference.clone(), child)));
        }

        registry
    }
}
