//! Project configuration (`cloudcom.toml`).
//!
//! The configuration tells cloudcom which tags are cloud components, which
//! attribute carries their `namespace@version` definition and which endpoint
//! serves their runtime code. Everything else has a default.
//!
//! ```toml
//! artifact_dir = ".cloudcom"
//! identifier_prefix = "CloudComponent"
//! renderer_module = "@mybricks/render-web"
//! fetch_timeout_secs = 30
//!
//! [[components]]
//! tag_name = "Widget"
//! def_keyword = "def"
//! api = "https://components.example.com/api/runtime"
//! ```
//!
//! Relative paths are resolved against the directory holding the configuration
//! file. A missing file is not an error for the transform: without configured
//! components every source passes through unchanged.

use crate::constants::{
    CACHE_FILE_NAME, DEFAULT_ARTIFACT_DIR, DEFAULT_FETCH_TIMEOUT, DEFAULT_IDENTIFIER_PREFIX,
    DEFAULT_RENDERER_MODULE, default_fetch_parallelism,
};
use crate::core::CloudcomError;
use crate::scanner::TagRegistry;
use crate::utils::fs::{absolutize, atomic_write};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Subdirectory of the artifact directory holding component artifacts.
const COMPONENT_SUBDIR: &str = "com";

/// One configured cloud-component tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Tag name matched in sources, e.g. `Widget`
    pub tag_name: String,
    /// Attribute carrying the `namespace@version` definition
    pub def_keyword: String,
    /// Absolute http(s) endpoint serving component runtimes
    pub api: String,
}

impl ComponentConfig {
    /// Creates a component entry.
    pub fn new(
        tag_name: impl Into<String>,
        def_keyword: impl Into<String>,
        api: impl Into<String>,
    ) -> Self {
        Self {
            tag_name: tag_name.into(),
            def_keyword: def_keyword.into(),
            api: api.into(),
        }
    }
}

/// Contents of `cloudcom.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory receiving generated modules
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Cache document; defaults to `<artifact_dir>/cache.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,

    /// Prefix of generated component identifiers
    #[serde(default = "default_identifier_prefix")]
    pub identifier_prefix: String,

    /// Module the generated render helper delegates to
    #[serde(default = "default_renderer_module")]
    pub renderer_module: String,

    /// Per-fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound of concurrent fetches; defaults to `max(10, 2 × cores)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_fetches: Option<usize>,

    /// Configured tags, later entries replacing earlier ones with the same name
    #[serde(default)]
    pub components: Vec<ComponentConfig>,

    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_DIR)
}

fn default_identifier_prefix() -> String {
    DEFAULT_IDENTIFIER_PREFIX.to_string()
}

fn default_renderer_module() -> String {
    DEFAULT_RENDERER_MODULE.to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            cache_file: None,
            identifier_prefix: default_identifier_prefix(),
            renderer_module: default_renderer_module(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: None,
            components: Vec::new(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

impl ProjectConfig {
    /// Loads configuration from `path`.
    ///
    /// # Errors
    ///
    /// [`CloudcomError::ConfigNotFound`] when the file does not exist,
    /// [`CloudcomError::ConfigParseError`] when it is not valid TOML for this schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CloudcomError::ConfigNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config from {}", path.display()));
            }
        };

        let mut config: Self =
            toml::from_str(&content).map_err(|e| CloudcomError::ConfigParseError {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.base_dir = config_base_dir(path)?;
        tracing::debug!(
            "Loaded {} with {} component(s)",
            path.display(),
            config.components.len()
        );
        Ok(config)
    }

    /// Loads configuration from `path`, falling back to defaults when the file is absent.
    ///
    /// Parse errors still fail.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load_from(path).await {
            Ok(config) => Ok(config),
            Err(e) if matches!(
                e.downcast_ref::<CloudcomError>(),
                Some(CloudcomError::ConfigNotFound { .. })
            ) =>
            {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default().with_base_dir(config_base_dir(path)?))
            }
            Err(e) => Err(e),
        }
    }

    /// Saves configuration to `path` atomically.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let path_buf = path.to_path_buf();

        tokio::task::spawn_blocking(move || atomic_write(&path_buf, content.as_bytes()))
            .await
            .context("Failed to join config write task")?
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Example configuration written by `cloudcom init`.
    pub fn example() -> Self {
        Self {
            components: vec![ComponentConfig::new(
                "Widget",
                "def",
                "https://components.example.com/api/runtime",
            )],
            ..Self::default()
        }
    }

    /// Replaces the directory relative paths are resolved against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute artifact directory; support modules live here.
    pub fn resolved_artifact_dir(&self) -> PathBuf {
        absolutize(&self.base_dir, &self.artifact_dir)
    }

    /// Absolute directory holding component artifacts.
    pub fn component_dir(&self) -> PathBuf {
        self.resolved_artifact_dir().join(COMPONENT_SUBDIR)
    }

    /// Absolute cache document path.
    pub fn resolved_cache_file(&self) -> PathBuf {
        match &self.cache_file {
            Some(file) => absolutize(&self.base_dir, file),
            None => self.resolved_artifact_dir().join(CACHE_FILE_NAME),
        }
    }

    /// Per-fetch timeout; zero falls back to the default.
    pub fn fetch_timeout(&self) -> Duration {
        if self.fetch_timeout_secs == 0 {
            DEFAULT_FETCH_TIMEOUT
        } else {
            Duration::from_secs(self.fetch_timeout_secs)
        }
    }

    /// Fetch concurrency bound, at least one.
    pub fn fetch_parallelism(&self) -> usize {
        self.max_concurrent_fetches.unwrap_or_else(default_fetch_parallelism).max(1)
    }

    /// Validated tag registry; invalid component entries are skipped with a warning.
    pub fn tag_registry(&self) -> TagRegistry {
        TagRegistry::from_components(&self.components)
    }
}

fn config_base_dir(path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    Ok(absolutize(&cwd, parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_applies_defaults_and_base_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cloudcom.toml");
        std::fs::write(
            &path,
            r#"
[[components]]
tag_name = "Widget"
def_keyword = "def"
api = "https://example.com/api"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load_from(&path).await.unwrap();
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.identifier_prefix, DEFAULT_IDENTIFIER_PREFIX);
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
        assert_eq!(config.resolved_artifact_dir(), temp.path().join(".cloudcom"));
        assert_eq!(config.component_dir(), temp.path().join(".cloudcom/com"));
        assert_eq!(config.resolved_cache_file(), temp.path().join(".cloudcom/cache.json"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cloudcom.toml");

        let err = ProjectConfig::load_from(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CloudcomError>(),
            Some(CloudcomError::ConfigNotFound { .. })
        ));

        let config = ProjectConfig::load_or_default(&path).await.unwrap();
        assert!(config.components.is_empty());
        assert_eq!(config.base_dir(), temp.path());
    }

    #[tokio::test]
    async fn test_load_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cloudcom.toml");
        std::fs::write(&path, "components = [ not toml").unwrap();

        let err = ProjectConfig::load_or_default(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CloudcomError>(),
            Some(CloudcomError::ConfigParseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_and_reload_example() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cloudcom.toml");

        ProjectConfig::example().save_to(&path).await.unwrap();
        let loaded = ProjectConfig::load_from(&path).await.unwrap();

        assert_eq!(loaded.components, ProjectConfig::example().components);
        assert_eq!(loaded.renderer_module, DEFAULT_RENDERER_MODULE);
    }

    #[test]
    fn test_explicit_cache_file_and_parallelism() {
        let config = ProjectConfig {
            cache_file: Some(PathBuf::from("build/cc.json")),
            max_concurrent_fetches: Some(0),
            fetch_timeout_secs: 5,
            ..ProjectConfig::default()
        }
        .with_base_dir("/proj");

        assert_eq!(config.resolved_cache_file(), PathBuf::from("/proj/build/cc.json"));
        assert_eq!(config.fetch_parallelism(), 1);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
    }
}
