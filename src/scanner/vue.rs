use super::markup::{TagNode, parse_markup};
use super::{Dialect, ImportSite, ScanContext, ScanOutcome, Scanner, plan_nodes};

/// Scanner for Vue single-file components.
///
/// Only elements inside the top-level `<template>` block are candidates; a
/// component without one passes through untouched. Imports go at the start of
/// the `<script setup>` block, or into a new one prepended to the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct VueScanner;

impl Scanner for VueScanner {
    fn dialect(&self) -> Dialect {
        Dialect::Vue
    }

    fn scan(&self, source: &str, ctx: &ScanContext<'_>) -> ScanOutcome {
        if ctx.registry.is_empty() {
            return ScanOutcome::pass_through();
        }

        let nodes = parse_markup(source);
        let Some(template) = nodes.iter().find(|n| n.depth == 0 && n.name == "template") else {
            tracing::debug!("No <template> block; leaving component untouched");
            return ScanOutcome::pass_through();
        };

        let body_start = template.end;
        let body_end = template.close.map_or(source.len(), |c| c.start);
        let candidates = nodes.iter().filter(|n| n.start >= body_start && n.start < body_end);

        plan_nodes(candidates, ctx, script_setup_site(&nodes))
    }
}

fn script_setup_site(nodes: &[TagNode]) -> ImportSite {
    nodes
        .iter()
        .find(|n| n.depth == 0 && n.name == "script" && n.has_attribute("setup") && !n.self_closing)
        .map_or(ImportSite::NewScriptSetup, |script| ImportSite::ScriptSetup(script.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tests::{deriver, registry};

    fn scan(source: &str) -> ScanOutcome {
        let registry = registry();
        let deriver = deriver("vue");
        let ctx = ScanContext {
            registry: &registry,
            deriver: &deriver,
            def_error_specifier: "/proj/.cloudcom/CloudComponentDefError.vue",
        };
        VueScanner.scan(source, &ctx)
    }

    #[test]
    fn test_without_template_passes_through() {
        let outcome = scan("<script setup>\nconst w = '<Widget def=\"a@1\"/>';\n</script>");
        assert!(!outcome.matched());
    }

    #[test]
    fn test_only_template_tags_are_candidates() {
        let source = r#"<template>
  <div><Widget def="ns@1.0.0" /></div>
</template>
<script setup>
import { ref } from "vue";
</script>
<docs><Widget def="docs@1" /></docs>"#;
        let outcome = scan(source);

        assert_eq!(outcome.references.len(), 1);
        assert_eq!(outcome.references[0].reference.namespace, "ns");
        assert!(outcome.references[0].identity.path.to_string_lossy().ends_with(".vue"));

        let script_end = source.find("<script setup>").unwrap() + "<script setup>".len();
        assert_eq!(outcome.plan.import_site, ImportSite::ScriptSetup(script_end));
    }

    #[test]
    fn test_missing_script_setup() {
        let outcome = scan("<template><Widget /></template>\n<script>export default {}</script>");
        assert_eq!(outcome.plan.import_site, ImportSite::NewScriptSetup);
        assert_eq!(outcome.definition_errors.len(), 1);
    }

    #[test]
    fn test_nested_template_elements_stay_in_scope() {
        let source = r#"<template>
  <template v-if="ok"><Widget def="a@1" /></template>
  <Widget def="b@1" />
</template>"#;
        let outcome = scan(source);
        assert_eq!(outcome.references.len(), 2);
    }
}
