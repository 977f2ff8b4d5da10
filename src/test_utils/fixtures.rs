//! Temporary projects and sample sources.

use crate::config::{ComponentConfig, ProjectConfig};
use crate::constants::CONFIG_FILE_NAME;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory with a `cloudcom.toml`.
///
/// The configuration declares `Widget` (attribute `def`) and `Panel`
/// (attribute `src`), both served by the given endpoint.
#[derive(Debug)]
pub struct ProjectFixture {
    temp: TempDir,
    config: ProjectConfig,
}

impl ProjectFixture {
    /// Creates the project and writes its configuration.
    pub fn new(api: &str) -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        let mut config = ProjectConfig::default().with_base_dir(temp.path());
        config.components = vec![
            ComponentConfig::new("Widget", "def", api),
            ComponentConfig::new("Panel", "src", api),
        ];

        let toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;
        fs::write(temp.path().join(CONFIG_FILE_NAME), toml)
            .context("Failed to write config file")?;

        Ok(Self {
            temp,
            config,
        })
    }

    /// Project root.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Path of the configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.path().join(CONFIG_FILE_NAME)
    }

    /// The configuration as written.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Writes a source file relative to the project root.
    pub fn write_source(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Reads a file relative to the project root.
    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path().join(relative);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Whether a file relative to the project root exists.
    pub fn file_exists(&self, relative: &str) -> bool {
        self.path().join(relative).exists()
    }

    /// Files in the component artifact directory, sorted by name.
    pub fn component_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.config.component_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        files.sort();
        Ok(files)
    }
}

/// Sample sources.
#[derive(Debug, Clone)]
pub struct SourceFixture {
    /// File name
    pub name: &'static str,
    /// Source text
    pub content: &'static str,
}

impl SourceFixture {
    /// A React module using one configured tag.
    pub fn jsx_single() -> Self {
        Self {
            name: "App.jsx",
            content: r#"import React from "react";

export default function App() {
  return (
    <main>
      <Widget def="shop@1.0.0" title="Cart" />
    </main>
  );
}
"#,
        }
    }

    /// A React module using no configured tag.
    pub fn jsx_untouched() -> Self {
        Self {
            name: "Plain.jsx",
            content: r#"export default function Plain() {
  return <div className="plain">nothing to see</div>;
}
"#,
        }
    }

    /// A React module whose configured tags have broken definitions.
    pub fn jsx_definition_errors() -> Self {
        Self {
            name: "Broken.jsx",
            content: r#"export default function Broken() {
  return (
    <section>
      <Widget />
      <Widget def="shop" />
    </section>
  );
}
"#,
        }
    }

    /// A Vue component with a `<script setup>` block.
    pub fn vue_single() -> Self {
        Self {
            name: "App.vue",
            content: r#"<template>
  <div>
    <Widget def="shop@1.0.0" />
  </div>
</template>

<script setup>
import { ref } from "vue";
const count = ref(0);
</script>
"#,
        }
    }
}
