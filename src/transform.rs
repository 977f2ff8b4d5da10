//! Per-source transform: scan, materialize, flush, rewrite.
//!
//! [`Transformer`] is what a host build tool calls once per source file. It owns
//! one [`Materializer`] per dialect, sharing the fetcher, the cache and the
//! fetch concurrency bound, so components seen in one file are not fetched
//! again for the next.
//!
//! A source that uses no configured tag comes back byte-identical and touches
//! nothing on disk. Component failures never fail the transform; only
//! environment problems do (unwritable artifact directory or cache document,
//! unreadable input).

use crate::codegen::CodeGenerator;
use crate::component::IdentityDeriver;
use crate::config::ProjectConfig;
use crate::core::{CloudcomError, FileOperation, FileResultExt};
use crate::materializer::{MaterializeReport, Materializer};
use crate::resolver::{ComponentFetcher, HttpFetcher};
use crate::rewriter;
use crate::scanner::{DefinitionError, Dialect, ScanContext, ScannedReference, TagRegistry};
use crate::store::ComponentCache;
use crate::utils::fs::write_if_changed_async;
use anyhow::{Context, Result};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};

/// Result of transforming one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Transformed source
    pub code: String,
    /// Whether `code` differs from the input
    pub changed: bool,
    /// Distinct top-level references
    pub references: Vec<ScannedReference>,
    /// Tags rewritten to the definition-error fallback
    pub definition_errors: Vec<DefinitionError>,
    /// Materialization counts
    pub report: MaterializeReport,
}

impl TransformOutput {
    fn unchanged(source: &str) -> Self {
        Self {
            code: source.to_string(),
            changed: false,
            references: Vec::new(),
            definition_errors: Vec::new(),
            report: MaterializeReport::default(),
        }
    }
}

/// Transforms sources against one project configuration.
#[derive(Debug)]
pub struct Transformer {
    registry: TagRegistry,
    cache: ComponentCache,
    jsx: Materializer,
    vue: Materializer,
    support_written: OnceCell<()>,
}

impl Transformer {
    /// Creates a transformer using `fetcher` and `cache`.
    ///
    /// # Errors
    ///
    /// Fails if the built-in templates cannot be compiled.
    pub fn new(
        config: &ProjectConfig,
        fetcher: Arc<dyn ComponentFetcher>,
        cache: ComponentCache,
    ) -> Result<Self> {
        let registry = config.tag_registry();
        let fetch_slots = Arc::new(Semaphore::new(config.fetch_parallelism()));

        let materializer = |dialect: Dialect| -> Result<Materializer> {
            Ok(Materializer::new(
                Arc::clone(&fetcher),
                cache.clone(),
                CodeGenerator::new(
                    dialect,
                    config.resolved_artifact_dir(),
                    config.renderer_module.clone(),
                )?,
                IdentityDeriver::new(
                    config.component_dir(),
                    dialect.artifact_extension(),
                    config.identifier_prefix.clone(),
                ),
                registry.clone(),
                Arc::clone(&fetch_slots),
                config.fetch_timeout(),
            ))
        };

        Ok(Self {
            jsx: materializer(Dialect::Jsx)?,
            vue: materializer(Dialect::Vue)?,
            registry,
            cache,
            support_written: OnceCell::new(),
        })
    }

    /// Creates a transformer fetching over HTTP with the configured cache document.
    pub async fn from_config(config: &ProjectConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;
        let cache = ComponentCache::load(config.resolved_cache_file()).await?;
        Self::new(config, Arc::new(fetcher), cache)
    }

    /// The shared cache.
    pub fn cache(&self) -> &ComponentCache {
        &self.cache
    }

    /// The validated tag configuration.
    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    /// Writes the support modules, once per transformer.
    ///
    /// Files whose content is already current are left untouched.
    pub async fn ensure_support_modules(&self) -> Result<()> {
        self.support_written
            .get_or_try_init(|| async {
                let files = self.jsx.generator().support_files()?;
                let writes = files.into_iter().map(|file| async move {
                    let path = file.path;
                    write_if_changed_async(path.clone(), file.content).await.map_err(|e| {
                        CloudcomError::ArtifactWriteFailed {
                            identifier: path
                                .file_stem()
                                .map(|s| s.to_string_lossy().into_owned())
                                .unwrap_or_default(),
                            path: path.display().to_string(),
                            reason: format!("{e:#}"),
                        }
                    })
                });
                let written = try_join_all(writes).await?.into_iter().filter(|w| *w).count();
                tracing::debug!("Support modules ready ({written} written)");
                Ok::<_, anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    /// Transforms `source` written in `dialect`.
    pub async fn transform(&self, source: &str, dialect: Dialect) -> Result<TransformOutput> {
        if self.registry.is_empty() {
            tracing::debug!("No component tags configured; passing source through");
            return Ok(TransformOutput::unchanged(source));
        }

        let materializer = self.materializer(dialect);
        let def_error_specifier = materializer.generator().def_error_specifier();
        let ctx = ScanContext {
            registry: &self.registry,
            deriver: materializer.deriver(),
            def_error_specifier: &def_error_specifier,
        };

        let outcome = dialect.scanner().scan(source, &ctx);
        if !outcome.matched() {
            return Ok(TransformOutput::unchanged(source));
        }

        self.ensure_support_modules().await?;

        let report = if outcome.references.is_empty() {
            MaterializeReport::default()
        } else {
            let report = materializer.materialize(&outcome.references).await;
            self.cache.flush().await.context("Failed to write cache document")?;
            report
        };

        let code = rewriter::apply(source, &outcome.plan);
        Ok(TransformOutput {
            changed: code != source,
            code,
            references: outcome.references,
            definition_errors: outcome.definition_errors,
            report,
        })
    }

    /// Reads and transforms the file at `path`.
    ///
    /// Without an explicit dialect it is picked from the file extension.
    pub async fn transform_file(
        &self,
        path: &Path,
        dialect: Option<Dialect>,
    ) -> Result<TransformOutput> {
        let dialect = match dialect.or_else(|| Dialect::from_path(path)) {
            Some(dialect) => dialect,
            None => {
                return Err(crate::core::CloudcomError::InvalidArguments {
                    message: format!(
                        "cannot tell the dialect of {}; pass --dialect jsx or --dialect vue",
                        path.display()
                    ),
                }
                .into());
            }
        };

        let source = tokio::fs::read_to_string(path).await.with_file_context(
            FileOperation::Read,
            path,
            "transforming source file",
            "transform_file",
        )?;

        tracing::debug!("Transforming {} as {dialect}", path.display());
        self.transform(&source, dialect).await
    }

    fn materializer(&self, dialect: Dialect) -> &Materializer {
        match dialect {
            Dialect::Jsx => &self.jsx,
            Dialect::Vue => &self.vue,
        }
    }
}
