//! Applies a [`RewritePlan`] to source text.
//!
//! All edits are positional: the scanner recorded byte spans, so rewriting is
//! a single forward pass that copies the untouched text between edits. Nothing
//! outside the recorded spans changes, which keeps formatting, comments and
//! unrelated markup byte-identical.

use crate::codegen::escape_attribute;
use crate::constants::DEF_ERROR_COMPONENT;
use crate::scanner::{ImportSite, NodeEdit, PlannedImport, RewritePlan};

#[derive(Debug)]
struct Splice {
    start: usize,
    end: usize,
    text: String,
}

impl Splice {
    fn replace(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }
}

/// Returns `source` with `plan` applied.
///
/// An empty plan returns the source unchanged.
pub fn apply(source: &str, plan: &RewritePlan) -> String {
    if plan.is_empty() {
        return source.to_string();
    }

    let mut splices = Vec::with_capacity(plan.edits.len() * 2 + 1);
    if let Some(splice) = import_splice(source, &plan.imports, plan.import_site) {
        splices.push(splice);
    }

    for edit in &plan.edits {
        match edit {
            NodeEdit::Rename {
                name_span,
                close_name_span,
                identifier,
            } => {
                splices.push(Splice::replace(name_span.start, name_span.end, identifier.as_str()));
                if let Some(close) = close_name_span {
                    splices.push(Splice::replace(close.start, close.end, identifier.as_str()));
                }
            }
            NodeEdit::DefError {
                name_span,
                close_name_span,
                attrs_end,
                tag_name,
                def_value,
            } => {
                splices.push(Splice::replace(name_span.start, name_span.end, DEF_ERROR_COMPONENT));
                splices.push(Splice::insert(
                    *attrs_end,
                    format!(
                        r#" tagName="{}" defValue="{}""#,
                        escape_attribute(tag_name),
                        escape_attribute(def_value)
                    ),
                ));
                if let Some(close) = close_name_span {
                    splices.push(Splice::replace(close.start, close.end, DEF_ERROR_COMPONENT));
                }
            }
        }
    }

    // Stable: at equal offsets imports stay first and a rename precedes the
    // attribute insertion right after the name
    splices.sort_by_key(|s| (s.start, s.end));

    let extra: usize = splices.iter().map(|s| s.text.len()).sum();
    let mut output = String::with_capacity(source.len() + extra);
    let mut cursor = 0;
    for splice in &splices {
        if splice.start < cursor || splice.end > source.len() {
            tracing::debug!("Skipping overlapping edit at {}..{}", splice.start, splice.end);
            continue;
        }
        output.push_str(&source[cursor..splice.start]);
        output.push_str(&splice.text);
        cursor = splice.end;
    }
    output.push_str(&source[cursor..]);
    output
}

fn import_splice(source: &str, imports: &[PlannedImport], site: ImportSite) -> Option<Splice> {
    if imports.is_empty() {
        return None;
    }

    let lines: Vec<String> = imports.iter().map(import_declaration).collect();

    let splice = match site {
        ImportSite::Offset(at) if at == 0 || source[..at].ends_with('\n') => {
            Splice::insert(at, lines.iter().map(|l| format!("{l}\n")).collect::<String>())
        }
        // After a directive on the same line: keep its line break after the imports
        ImportSite::Offset(at) => Splice::insert(at, format!("\n{}", lines.join("\n"))),
        ImportSite::ScriptSetup(at) => Splice::insert(at, format!("\n{}", lines.join("\n"))),
        ImportSite::NewScriptSetup => {
            Splice::insert(0, format!("<script setup>\n{}\n</script>\n\n", lines.join("\n")))
        }
    };

    Some(splice)
}

fn import_declaration(import: &PlannedImport) -> String {
    let specifier =
        serde_json::to_string(&import.specifier).unwrap_or_else(|_| format!("\"{}\"", import.specifier));
    format!("import {} from {specifier};", import.local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::IdentityDeriver;
    use crate::config::ComponentConfig;
    use crate::scanner::{Dialect, ScanContext, TagRegistry};

    fn rewrite(source: &str, dialect: Dialect) -> String {
        let registry = TagRegistry::from_components(&[ComponentConfig::new(
            "Widget",
            "def",
            "https://components.example.com/api",
        )]);
        let deriver =
            IdentityDeriver::new("/proj/.cloudcom/com", dialect.artifact_extension(), "Cc");
        let specifier = format!("/proj/.cloudcom/CloudComponentDefError.{}", match dialect {
            Dialect::Jsx => "jsx",
            Dialect::Vue => "vue",
        });
        let ctx = ScanContext {
            registry: &registry,
            deriver: &deriver,
            def_error_specifier: &specifier,
        };
        let outcome = dialect.scanner().scan(source, &ctx);
        apply(source, &outcome.plan)
    }

    fn identifier(dialect: Dialect, namespace: &str, version: &str) -> String {
        IdentityDeriver::new("/proj/.cloudcom/com", dialect.artifact_extension(), "Cc")
            .derive("Widget", namespace, version)
            .identifier
    }

    #[test]
    fn test_empty_plan_is_identity() {
        let source = "const a = <div>hi</div>;\n";
        assert_eq!(apply(source, &RewritePlan::empty()), source);
        assert_eq!(rewrite(source, Dialect::Jsx), source);
    }

    #[test]
    fn test_jsx_rename_and_import() {
        let source = "export default () => <Widget def=\"ns@1.0.0\">x</Widget>;\n";
        let id = identifier(Dialect::Jsx, "ns", "1.0.0");

        let output = rewrite(source, Dialect::Jsx);

        assert_eq!(
            output,
            format!(
                "import {id} from \"/proj/.cloudcom/com/{id}.js\";\nexport default () => <{id} def=\"ns@1.0.0\">x</{id}>;\n"
            )
        );
    }

    #[test]
    fn test_import_after_directive() {
        let source = "\"use client\";\nconst a = <Widget def=\"ns@1\" />;\n";
        let id = identifier(Dialect::Jsx, "ns", "1");

        let output = rewrite(source, Dialect::Jsx);

        assert!(output.starts_with(&format!(
            "\"use client\";\nimport {id} from \"/proj/.cloudcom/com/{id}.js\";\nconst a"
        )));
    }

    #[test]
    fn test_definition_error_attributes() {
        let source = r#"const a = <p><Widget /><Widget def="a&quot;b" /></p>;"#;

        let output = rewrite(source, Dialect::Jsx);

        assert!(output.starts_with(
            "import CloudComponentDefError from \"/proj/.cloudcom/CloudComponentDefError.jsx\";\n"
        ));
        assert!(output.contains(r#"<CloudComponentDefError tagName="Widget" defValue="" />"#));
        assert!(output.contains(
            r#"<CloudComponentDefError def="a&quot;b" tagName="Widget" defValue="a&amp;quot;b" />"#
        ));
        assert_eq!(output.matches("import CloudComponentDefError").count(), 1);
    }

    #[test]
    fn test_vue_existing_script_setup() {
        let source = "<template>\n  <Widget def=\"ns@1\" />\n</template>\n<script setup>\nimport { ref } from \"vue\";\n</script>\n";
        let id = identifier(Dialect::Vue, "ns", "1");

        let output = rewrite(source, Dialect::Vue);

        assert!(output.contains(&format!("<{id} def=\"ns@1\" />")));
        assert!(output.contains(&format!(
            "<script setup>\nimport {id} from \"/proj/.cloudcom/com/{id}.vue\";\nimport {{ ref }} from \"vue\";"
        )));
    }

    #[test]
    fn test_vue_new_script_setup() {
        let source = "<template><Widget /></template>\n";

        let output = rewrite(source, Dialect::Vue);

        assert_eq!(
            output,
            "<script setup>\nimport CloudComponentDefError from \"/proj/.cloudcom/CloudComponentDefError.vue\";\n</script>\n\n<template><CloudComponentDefError tagName=\"Widget\" defValue=\"\" /></template>\n"
        );
    }
}
