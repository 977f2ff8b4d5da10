//! Code generation for component artifacts and support modules.
//!
//! Every generated file comes from a Tera template compiled into the binary.
//! Three artifact shapes exist per dialect:
//!
//! - **entry**: the module a source file imports for a top-level reference. It
//!   registers the flattened dependency closure in `comDefs`, binds the fetched
//!   runtime as `RenderCom` and exports a component wrapping it in the error
//!   boundary.
//! - **dependency**: a sub-dependency's runtime, preceded by a registry of its
//!   own dependencies when it has any.
//! - **error**: a diagnostic component naming the tag, namespace and version
//!   that could not be resolved.
//!
//! Pre-compiled runtimes (anything not starting with `function`) are written to
//! a companion `*CompiledCode.js` module and imported instead of embedded.
//!
//! Support modules live next to the component directory and are referenced by
//! absolute, forward-slash import specifiers.

use crate::component::{ComponentIdentity, ComponentReference};
use crate::constants::DEF_ERROR_COMPONENT;
use crate::core::CloudcomError;
use crate::resolver::{ComponentPayload, RuntimeKind};
use crate::scanner::Dialect;
use crate::utils::fs::to_module_specifier;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

const STYLE_CONST_FILE: &str = "CloudComponentConst.js";
const ERROR_BOUNDARY_FILE: &str = "CloudComponentErrorBoundary.js";
const RENDER_COM_FILE: &str = "CloudComponentRenderCom.js";

/// Inline style of diagnostic elements in Vue templates.
const VUE_DIAGNOSTIC_STYLE: &str = "font-size: 12px; color: #f5222d; overflow: hidden";

const TEMPLATES: &[(&str, &str)] = &[
    ("registry.tera", include_str!("templates/registry.tera")),
    ("dependency.tera", include_str!("templates/dependency.tera")),
    ("jsx_entry.tera", include_str!("templates/jsx_entry.tera")),
    ("jsx_dependency.tera", include_str!("templates/jsx_dependency.tera")),
    ("jsx_error.tera", include_str!("templates/jsx_error.tera")),
    ("vue_entry.tera", include_str!("templates/vue_entry.tera")),
    ("vue_dependency.tera", include_str!("templates/vue_dependency.tera")),
    ("vue_error.tera", include_str!("templates/vue_error.tera")),
    ("style_const.tera", include_str!("templates/style_const.tera")),
    ("error_boundary.tera", include_str!("templates/error_boundary.tera")),
    ("render_com.tera", include_str!("templates/render_com.tera")),
    ("def_error_jsx.tera", include_str!("templates/def_error_jsx.tera")),
    ("def_error_vue.tera", include_str!("templates/def_error_vue.tera")),
];

/// A file to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Absolute destination
    pub path: PathBuf,
    /// Full content
    pub content: String,
}

impl GeneratedFile {
    fn new(path: impl Into<PathBuf>, content: String) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }
}

/// One `comDefs` registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    /// `namespace-version` key the renderer looks components up by
    pub key: String,
    /// Local binding of the imported artifact
    pub identifier: String,
    /// Import specifier of the artifact
    pub specifier: String,
}

impl RegistryEntry {
    /// Registration of `identity` under the key of `reference`.
    pub fn new(reference: &ComponentReference, identity: &ComponentIdentity) -> Self {
        Self {
            key: reference.registry_key(),
            identifier: identity.identifier.clone(),
            specifier: identity.import_specifier(),
        }
    }
}

/// Paths of the shared support modules.
#[derive(Debug, Clone)]
pub struct SupportLayout {
    dir: PathBuf,
}

#[derive(Serialize)]
struct SupportSpecifiers {
    style_const: String,
    error_boundary: String,
    render_com: String,
}

impl SupportLayout {
    /// Support modules placed directly in `artifact_dir`.
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: artifact_dir.into(),
        }
    }

    /// Shared diagnostic style.
    pub fn style_const(&self) -> PathBuf {
        self.dir.join(STYLE_CONST_FILE)
    }

    /// Error boundary wrapping every entry component.
    pub fn error_boundary(&self) -> PathBuf {
        self.dir.join(ERROR_BOUNDARY_FILE)
    }

    /// Render helper handed to runtimes through `env.renderCom`.
    pub fn render_com(&self) -> PathBuf {
        self.dir.join(RENDER_COM_FILE)
    }

    /// Definition-error fallback component for `dialect`.
    pub fn def_error(&self, dialect: Dialect) -> PathBuf {
        let extension = match dialect {
            Dialect::Jsx => "jsx",
            Dialect::Vue => "vue",
        };
        self.dir.join(format!("{DEF_ERROR_COMPONENT}.{extension}"))
    }

    fn specifiers(&self) -> SupportSpecifiers {
        SupportSpecifiers {
            style_const: to_module_specifier(&self.style_const()),
            error_boundary: to_module_specifier(&self.error_boundary()),
            render_com: to_module_specifier(&self.render_com()),
        }
    }
}

/// Renders artifacts for one dialect.
#[derive(Debug)]
pub struct CodeGenerator {
    tera: Tera,
    dialect: Dialect,
    support: SupportLayout,
    renderer_module: String,
}

impl CodeGenerator {
    /// Compiles the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`CloudcomError::TemplateError`] if a template fails to parse.
    pub fn new(
        dialect: Dialect,
        artifact_dir: impl Into<PathBuf>,
        renderer_module: impl Into<String>,
    ) -> Result<Self> {
        let mut tera = Tera::default();
        // Output is JavaScript and Vue markup, never HTML
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(TEMPLATES.to_vec()).map_err(|e| CloudcomError::TemplateError {
            template: "built-in templates".to_string(),
            reason: error_chain(&e),
        })?;

        Ok(Self {
            tera,
            dialect,
            support: SupportLayout::new(artifact_dir),
            renderer_module: renderer_module.into(),
        })
    }

    /// The dialect artifacts are generated for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Support module paths.
    pub fn support(&self) -> &SupportLayout {
        &self.support
    }

    /// Import specifier of the definition-error fallback for this dialect.
    pub fn def_error_specifier(&self) -> String {
        to_module_specifier(&self.support.def_error(self.dialect))
    }

    /// All support modules. Both fallback variants are produced so one
    /// artifact directory can serve both dialects.
    pub fn support_files(&self) -> Result<Vec<GeneratedFile>> {
        let mut ctx = self.base_context();
        ctx.insert("renderer_module", &self.renderer_module);
        ctx.insert("component", DEF_ERROR_COMPONENT);
        ctx.insert("inline_style", VUE_DIAGNOSTIC_STYLE);

        Ok(vec![
            GeneratedFile::new(self.support.style_const(), self.render("style_const.tera", &ctx)?),
            GeneratedFile::new(
                self.support.error_boundary(),
                self.render("error_boundary.tera", &ctx)?,
            ),
            GeneratedFile::new(self.support.render_com(), self.render("render_com.tera", &ctx)?),
            GeneratedFile::new(
                self.support.def_error(Dialect::Jsx),
                self.render("def_error_jsx.tera", &ctx)?,
            ),
            GeneratedFile::new(
                self.support.def_error(Dialect::Vue),
                self.render("def_error_vue.tera", &ctx)?,
            ),
        ])
    }

    /// Entry artifact for a top-level reference, plus its companion module
    /// when the runtime is pre-compiled.
    pub fn entry_files(
        &self,
        reference: &ComponentReference,
        identity: &ComponentIdentity,
        companion: &Path,
        payload: &ComponentPayload,
        registry: &[RegistryEntry],
    ) -> Result<Vec<GeneratedFile>> {
        let mut ctx = self.base_context();
        ctx.insert("registry", registry);
        ctx.insert("namespace", &reference.namespace);
        ctx.insert("version", &reference.version);
        ctx.insert("namespace_attr", &escape_attribute(&reference.namespace));
        ctx.insert("version_attr", &escape_attribute(&reference.version));

        let mut files = Vec::with_capacity(2);
        match payload.runtime_kind() {
            RuntimeKind::Source => {
                ctx.insert("inline_runtime", &bind_render_com(payload.trimmed_runtime()));
            }
            RuntimeKind::Compiled => {
                ctx.insert("companion", &to_module_specifier(companion));
                files.push(GeneratedFile::new(companion, payload.runtime.clone()));
            }
        }

        let template = match self.dialect {
            Dialect::Jsx => "jsx_entry.tera",
            Dialect::Vue => "vue_entry.tera",
        };
        files.insert(0, GeneratedFile::new(&identity.path, self.render(template, &ctx)?));
        Ok(files)
    }

    /// Dependency artifact for a sub-dependency, plus its companion module
    /// when the runtime is pre-compiled.
    pub fn dependency_files(
        &self,
        identity: &ComponentIdentity,
        companion: &Path,
        payload: &ComponentPayload,
        registry: &[RegistryEntry],
    ) -> Result<Vec<GeneratedFile>> {
        let mut ctx = self.base_context();
        ctx.insert("registry", registry);

        let mut files = Vec::with_capacity(2);
        match payload.runtime_kind() {
            RuntimeKind::Source => ctx.insert("inline_runtime", payload.trimmed_runtime()),
            RuntimeKind::Compiled => {
                ctx.insert("companion", &to_module_specifier(companion));
                files.push(GeneratedFile::new(companion, payload.runtime.clone()));
            }
        }

        let template = match self.dialect {
            Dialect::Jsx => "jsx_dependency.tera",
            Dialect::Vue => "vue_dependency.tera",
        };
        files.insert(0, GeneratedFile::new(&identity.path, self.render(template, &ctx)?));
        Ok(files)
    }

    /// Diagnostic artifact for a reference that could not be resolved.
    pub fn error_file(
        &self,
        reference: &ComponentReference,
        identity: &ComponentIdentity,
    ) -> Result<GeneratedFile> {
        let message = format!(
            "Component (tagName = {}, namespace = {}, version = {}) not found.",
            reference.tag_name, reference.namespace, reference.version
        );

        let mut ctx = self.base_context();
        let template = match self.dialect {
            Dialect::Jsx => {
                ctx.insert("message", &message);
                "jsx_error.tera"
            }
            Dialect::Vue => {
                ctx.insert("message_html", &escape_template_text(&message));
                ctx.insert("inline_style", VUE_DIAGNOSTIC_STYLE);
                "vue_error.tera"
            }
        };

        Ok(GeneratedFile::new(&identity.path, self.render(template, &ctx)?))
    }

    fn base_context(&self) -> Context {
        let mut ctx = Context::new();
        ctx.insert("support", &self.support.specifiers());
        ctx
    }

    fn render(&self, template: &str, ctx: &Context) -> Result<String> {
        let rendered =
            self.tera.render(template, ctx).map_err(|e| CloudcomError::TemplateError {
                template: template.to_string(),
                reason: error_chain(&e),
            })?;
        Ok(rendered)
    }
}

/// Binds a source runtime to the name `RenderCom`. Anonymous functions are
/// named in place; a named function keeps its own name and is aliased.
fn bind_render_com(runtime: &str) -> String {
    match runtime.strip_prefix("function") {
        Some(rest) if rest.trim_start().starts_with('(') => {
            format!("function RenderCom{rest}")
        }
        _ => format!("const RenderCom = {runtime};"),
    }
}

/// Escapes a value for a double-quoted markup attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escapes text content of a Vue template, including mustache braces.
fn escape_template_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
