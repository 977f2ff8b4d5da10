//! Validated tag configuration.

use crate::config::ComponentConfig;
use reqwest::Url;
use std::collections::BTreeMap;

/// How one configured tag is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    /// Attribute carrying the `namespace@version` definition
    pub def_keyword: String,
    /// Endpoint serving component runtimes
    pub api: Url,
}

/// Lookup from tag name to [`TagSpec`].
///
/// Built from the ordered component list of the configuration. Later entries
/// with the same tag name replace earlier ones; entries with an empty tag name,
/// an empty definition attribute or a non-http(s) endpoint are dropped with a
/// warning.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: BTreeMap<String, TagSpec>,
}

impl TagRegistry {
    /// Builds a registry, skipping invalid entries.
    pub fn from_components(components: &[ComponentConfig]) -> Self {
        let mut tags = BTreeMap::new();

        for component in components {
            match validate(component) {
                Ok(spec) => {
                    if tags.insert(component.tag_name.clone(), spec).is_some() {
                        tracing::debug!(
                            "Component tag '{}' configured more than once; using the last entry",
                            component.tag_name
                        );
                    }
                }
                Err(reason) => {
                    tracing::warn!(
                        "Skipping component configuration for tag '{}': {reason}",
                        component.tag_name
                    );
                }
            }
        }

        Self {
            tags,
        }
    }

    /// Spec of a configured tag.
    pub fn get(&self, tag_name: &str) -> Option<&TagSpec> {
        self.tags.get(tag_name)
    }

    /// Whether `tag_name` is configured.
    pub fn contains(&self, tag_name: &str) -> bool {
        self.tags.contains_key(tag_name)
    }

    /// Whether no tag is configured.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Number of configured tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Configured tag names in sorted order.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }
}

fn validate(component: &ComponentConfig) -> Result<TagSpec, String> {
    if component.tag_name.trim().is_empty() {
        return Err("tag_name is empty".to_string());
    }
    if component.def_keyword.trim().is_empty() {
        return Err("def_keyword is empty".to_string());
    }

    let api = Url::parse(&component.api).map_err(|e| format!("invalid api URL: {e}"))?;
    if !matches!(api.scheme(), "http" | "https") {
        return Err(format!("api URL must use http or https, got '{}'", api.scheme()));
    }

    Ok(TagSpec {
        def_keyword: component.def_keyword.clone(),
        api,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_entries_are_skipped() {
        let registry = TagRegistry::from_components(&[
            ComponentConfig::new("", "def", "https://a.example/api"),
            ComponentConfig::new("NoKeyword", "", "https://a.example/api"),
            ComponentConfig::new("Relative", "def", "/api/runtime"),
            ComponentConfig::new("Ftp", "def", "ftp://a.example/api"),
            ComponentConfig::new("Widget", "def", "https://a.example/api"),
        ]);

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("Widget"));
        assert!(!registry.contains("Relative"));
    }

    #[test]
    fn test_later_entry_wins() {
        let registry = TagRegistry::from_components(&[
            ComponentConfig::new("Widget", "def", "https://a.example/api"),
            ComponentConfig::new("Widget", "src", "https://b.example/api?x=1"),
        ]);

        let spec = registry.get("Widget").unwrap();
        assert_eq!(spec.def_keyword, "src");
        assert_eq!(spec.api.host_str(), Some("b.example"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = TagRegistry::from_components(&[]);
        assert!(registry.is_empty());
        assert_eq!(registry.tag_names().count(), 0);
    }
}
