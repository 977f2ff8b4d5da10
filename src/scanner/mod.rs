//! Tag scanning: finding cloud-component references in a source file.
//!
//! A [`Scanner`] reads a source file, finds every tag whose name is configured
//! in the [`TagRegistry`], and validates its definition attribute. The result is
//! read-only: a [`ScanOutcome`] holding the distinct references and a
//! [`RewritePlan`] of edits the [`rewriter`](crate::rewriter) applies later in a
//! single pass.
//!
//! For each configured tag:
//!
//! - definition attribute absent → a *missing definition* error marker
//! - value not exactly `namespace@version` with both parts non-empty → a
//!   *malformed definition* error marker carrying the raw value
//! - otherwise a [`ComponentReference`] and a rename of the tag to its identifier
//!
//! Repeated `(tag, namespace, version)` triples share one identifier and
//! contribute one import. Error markers share one import of the fallback
//! component, added on first occurrence.
//!
//! Two dialects exist: [`JsxScanner`] for JavaScript/TypeScript modules and
//! [`VueScanner`] for single-file components, which only looks inside the
//! top-level `<template>` block.

pub mod markup;

mod jsx;
mod registry;
mod vue;

pub use jsx::JsxScanner;
pub use registry::{TagRegistry, TagSpec};
pub use vue::VueScanner;

use crate::component::{ComponentIdentity, ComponentReference, IdentityDeriver};
use crate::constants::DEF_ERROR_COMPONENT;
use crate::core::CloudcomError;
use markup::{AttrValue, Span, TagNode};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use strsim::levenshtein;

/// Maximum Levenshtein distance, as a percentage of the keyword length, for
/// suggesting a misspelled definition attribute.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Source dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// JavaScript/TypeScript modules containing JSX
    Jsx,
    /// Vue single-file components
    Vue,
}

impl Dialect {
    /// Picks the dialect from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" | "mts" | "cts" => Some(Self::Jsx),
            "vue" => Some(Self::Vue),
            _ => None,
        }
    }

    /// Extension of generated component artifacts.
    pub const fn artifact_extension(self) -> &'static str {
        match self {
            Self::Jsx => "js",
            Self::Vue => "vue",
        }
    }

    /// The scanner for this dialect.
    pub fn scanner(self) -> Box<dyn Scanner> {
        match self {
            Self::Jsx => Box::new(JsxScanner),
            Self::Vue => Box::new(VueScanner),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jsx => write!(f, "jsx"),
            Self::Vue => write!(f, "vue"),
        }
    }
}

impl FromStr for Dialect {
    type Err = CloudcomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsx" | "js" | "react" => Ok(Self::Jsx),
            "vue" => Ok(Self::Vue),
            _ => Err(CloudcomError::InvalidDialect {
                value: s.to_string(),
            }),
        }
    }
}

/// Inputs shared by every scan of one transform.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// Configured tags
    pub registry: &'a TagRegistry,
    /// Identity derivation for the dialect
    pub deriver: &'a IdentityDeriver,
    /// Import specifier of the definition-error fallback component
    pub def_error_specifier: &'a str,
}

/// A distinct reference found in the source, with its derived identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedReference {
    /// The reference triple
    pub reference: ComponentReference,
    /// Its identity
    pub identity: ComponentIdentity,
}

/// Why a configured tag could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionProblem {
    /// The definition attribute is absent
    Missing,
    /// The definition value is not `namespace@version`
    Malformed,
}

/// A tag rewritten to the definition-error fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionError {
    /// Tag name as written
    pub tag_name: String,
    /// Raw definition value, empty when missing
    pub def_value: String,
    /// What was wrong
    pub problem: DefinitionProblem,
}

/// One staged edit of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEdit {
    /// Rename the tag to a component identifier
    Rename {
        /// Opening tag name
        name_span: Span,
        /// Closing tag name, if any
        close_name_span: Option<Span>,
        /// New tag name
        identifier: String,
    },
    /// Rename the tag to the fallback component and append its attributes
    DefError {
        /// Opening tag name
        name_span: Span,
        /// Closing tag name, if any
        close_name_span: Option<Span>,
        /// Offset after the last existing attribute
        attrs_end: usize,
        /// Original tag name
        tag_name: String,
        /// Raw definition value
        def_value: String,
    },
}

/// A default import to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedImport {
    /// Local binding
    pub local: String,
    /// Module specifier
    pub specifier: String,
}

/// Where import declarations go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSite {
    /// Insert directly at this offset of a module
    Offset(usize),
    /// Insert at the start of the existing `<script setup>` body
    ScriptSetup(usize),
    /// Prepend a new `<script setup>` block
    NewScriptSetup,
}

/// Edits staged by a scan, applied by [`rewriter::apply`](crate::rewriter::apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    /// Imports in first-occurrence order
    pub imports: Vec<PlannedImport>,
    /// Tag edits in source order
    pub edits: Vec<NodeEdit>,
    /// Insertion point for `imports`
    pub import_site: ImportSite,
}

impl RewritePlan {
    /// A plan with nothing to do.
    pub const fn empty() -> Self {
        Self {
            imports: Vec::new(),
            edits: Vec::new(),
            import_site: ImportSite::Offset(0),
        }
    }

    /// Whether applying the plan would leave the source unchanged.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.imports.is_empty()
    }
}

/// Result of scanning one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Distinct references in first-occurrence order
    pub references: Vec<ScannedReference>,
    /// Every tag rewritten to the fallback
    pub definition_errors: Vec<DefinitionError>,
    /// Staged edits
    pub plan: RewritePlan,
}

impl ScanOutcome {
    /// An outcome that leaves the source untouched.
    pub const fn pass_through() -> Self {
        Self {
            references: Vec::new(),
            definition_errors: Vec::new(),
            plan: RewritePlan::empty(),
        }
    }

    /// Whether any configured tag was found.
    pub fn matched(&self) -> bool {
        !self.plan.edits.is_empty()
    }
}

/// Dialect-specific scanning strategy.
pub trait Scanner: Send + Sync {
    /// The dialect this scanner reads.
    fn dialect(&self) -> Dialect;

    /// Scans `source` for configured tags.
    fn scan(&self, source: &str, ctx: &ScanContext<'_>) -> ScanOutcome;
}

/// Builds the outcome for candidate `nodes`, in source order.
pub(crate) fn plan_nodes<'n>(
    nodes: impl IntoIterator<Item = &'n TagNode>,
    ctx: &ScanContext<'_>,
    import_site: ImportSite,
) -> ScanOutcome {
    let mut identities: HashMap<ComponentReference, String> = HashMap::new();
    let mut references = Vec::new();
    let mut definition_errors = Vec::new();
    let mut imports = Vec::new();
    let mut edits = Vec::new();
    let mut def_error_imported = false;

    for node in nodes {
        let Some(spec) = ctx.registry.get(&node.name) else {
            continue;
        };
        let close_name_span = node.close.map(|c| c.name_span);

        match read_definition(node, &spec.def_keyword) {
            Ok(reference) => {
                let identifier = match identities.get(&reference) {
                    Some(identifier) => identifier.clone(),
                    None => {
                        let identity = ctx.deriver.derive_reference(&reference);
                        tracing::debug!("Found {reference} -> {}", identity.identifier);

                        imports.push(PlannedImport {
                            local: identity.identifier.clone(),
                            specifier: identity.import_specifier(),
                        });
                        identities.insert(reference.clone(), identity.identifier.clone());
                        let identifier = identity.identifier.clone();
                        references.push(ScannedReference {
                            reference,
                            identity,
                        });
                        identifier
                    }
                };

                edits.push(NodeEdit::Rename {
                    name_span: node.name_span,
                    close_name_span,
                    identifier,
                });
            }
            Err((problem, def_value)) => {
                match problem {
                    DefinitionProblem::Missing => tracing::warn!(
                        "<{}> has no '{}' attribute; rendering the definition-error fallback",
                        node.name,
                        spec.def_keyword
                    ),
                    DefinitionProblem::Malformed => tracing::warn!(
                        "<{}> has malformed definition '{def_value}' (expected namespace@version)",
                        node.name
                    ),
                }

                if !def_error_imported {
                    def_error_imported = true;
                    imports.push(PlannedImport {
                        local: DEF_ERROR_COMPONENT.to_string(),
                        specifier: ctx.def_error_specifier.to_string(),
                    });
                }

                edits.push(NodeEdit::DefError {
                    name_span: node.name_span,
                    close_name_span,
                    attrs_end: node.attrs_end,
                    tag_name: node.name.clone(),
                    def_value: def_value.clone(),
                });
                definition_errors.push(DefinitionError {
                    tag_name: node.name.clone(),
                    def_value,
                    problem,
                });
            }
        }
    }

    ScanOutcome {
        references,
        definition_errors,
        plan: RewritePlan {
            imports,
            edits,
            import_site,
        },
    }
}

fn read_definition(
    node: &TagNode,
    def_keyword: &str,
) -> Result<ComponentReference, (DefinitionProblem, String)> {
    let Some(attribute) = node.attribute(def_keyword) else {
        suggest_keyword(node, def_keyword);
        return Err((DefinitionProblem::Missing, String::new()));
    };

    let raw = match &attribute.value {
        None => String::new(),
        Some(AttrValue::Literal(value)) => value.clone(),
        Some(AttrValue::Expression(expr)) => match string_literal(expr) {
            Some(value) => value.to_string(),
            None => return Err((DefinitionProblem::Malformed, format!("{{{expr}}}"))),
        },
    };

    ComponentReference::from_definition(&node.name, &raw).ok_or((DefinitionProblem::Malformed, raw))
}

/// Contents of an expression that is a single plain string literal.
fn string_literal(expr: &str) -> Option<&str> {
    let expr = expr.trim();
    let quote = expr.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') || expr.len() < 2 || !expr.ends_with(quote) {
        return None;
    }

    let inner = &expr[1..expr.len() - 1];
    if inner.contains(quote) || inner.contains('\\') || (quote == '`' && inner.contains("${")) {
        return None;
    }
    Some(inner)
}

fn suggest_keyword(node: &TagNode, def_keyword: &str) {
    let threshold = def_keyword.len() * SIMILARITY_THRESHOLD_PERCENT / 100;
    let closest = node
        .attributes
        .iter()
        .map(|a| (a.name.as_str(), levenshtein(def_keyword, &a.name)))
        .filter(|(_, distance)| *distance <= threshold)
        .min_by_key(|(_, distance)| *distance);

    if let Some((name, _)) = closest {
        tracing::warn!("<{}> has attribute '{name}'; did you mean '{def_keyword}'?", node.name);
    }
}
