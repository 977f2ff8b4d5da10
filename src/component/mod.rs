//! Component data model and identifier derivation.
//!
//! A [`ComponentReference`] is the `(tag_name, namespace, version)` triple pulled
//! out of a source tag such as `<Widget def="shop@1.2.0"/>`. Its identity is the
//! triple: two references with the same triple are the same logical component no
//! matter which file mentions them.
//!
//! [`IdentityDeriver`] maps a triple onto a [`ComponentIdentity`]: the symbol the
//! generated import binds and the file the artifact lives in. The mapping is a
//! pure function of the triple and the deriver's settings, which is what makes
//! cache lookups and import deduplication correct.
//!
//! # Identifier shape
//!
//! ```text
//! CloudComponent + sanitize(tag + namespace + version) + "_" + sha256(tag\0namespace\0version)[..8]
//! ```
//!
//! Sanitizing keeps only `[A-Za-z0-9_$]`, which strips the `@`, `.` and `-`
//! characters common in definitions. Stripping alone is not injective
//! (`a-b@1.0` and `ab@10` collapse to the same text), so the digest of the raw
//! triple is appended.

use crate::constants::{COMPILED_CODE_SUFFIX, IDENTIFIER_DIGEST_LEN};
use crate::utils::fs::to_module_specifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Sub-dependency declared by a fetched component payload.
///
/// Dependencies carry no tag name of their own; they inherit the owning tag's
/// name when lifted to a [`ComponentReference`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    /// Component namespace
    pub namespace: String,
    /// Exact component version
    pub version: String,
}

impl DependencyDescriptor {
    /// Creates a descriptor.
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.namespace, self.version)
    }
}

/// A tag reference to a cloud component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentReference {
    /// Configured tag name the reference was found under
    pub tag_name: String,
    /// Component namespace
    pub namespace: String,
    /// Exact component version
    pub version: String,
}

impl ComponentReference {
    /// Creates a reference from its parts.
    pub fn new(
        tag_name: impl Into<String>,
        namespace: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            tag_name: tag_name.into(),
            namespace: namespace.into(),
            version: version.into(),
        }
    }

    /// Builds a reference from a raw `namespace@version` definition.
    ///
    /// Returns `None` when the definition is malformed (see [`parse_definition`]).
    pub fn from_definition(tag_name: &str, definition: &str) -> Option<Self> {
        let (namespace, version) = parse_definition(definition)?;
        Some(Self::new(tag_name, namespace, version))
    }

    /// Lifts a declared sub-dependency to a full reference under this reference's tag.
    pub fn child(&self, dep: &DependencyDescriptor) -> Self {
        Self::new(&self.tag_name, &dep.namespace, &dep.version)
    }

    /// The `"{namespace}-{version}"` key used in generated definition registries.
    pub fn registry_key(&self) -> String {
        format!("{}-{}", self.namespace, self.version)
    }

    /// The `namespace@version` definition text.
    pub fn definition(&self) -> String {
        format!("{}@{}", self.namespace, self.version)
    }
}

impl fmt::Display for ComponentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {}@{}", self.tag_name, self.namespace, self.version)
    }
}

/// Splits a `namespace@version` definition.
///
/// The value must split on `@` into exactly two parts, both non-empty.
///
/// ```rust
/// use cloudcom_cli::component::parse_definition;
///
/// assert_eq!(parse_definition("shop@1.2.0"), Some(("shop", "1.2.0")));
/// assert_eq!(parse_definition("shop"), None);
/// assert_eq!(parse_definition("@1.2.0"), None);
/// assert_eq!(parse_definition("a@b@c"), None);
/// ```
pub fn parse_definition(raw: &str) -> Option<(&str, &str)> {
    let mut parts = raw.split('@');
    let namespace = parts.next()?;
    let version = parts.next()?;

    if parts.next().is_some() || namespace.is_empty() || version.is_empty() {
        return None;
    }

    Some((namespace, version))
}

/// Derived symbol and file location of a component artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentIdentity {
    /// Module-level symbol bound by generated imports
    pub identifier: String,
    /// Absolute artifact path
    pub path: PathBuf,
}

impl ComponentIdentity {
    /// The artifact path rendered as an import specifier.
    pub fn import_specifier(&self) -> String {
        to_module_specifier(&self.path)
    }
}

/// Maps reference triples onto [`ComponentIdentity`] values.
#[derive(Debug, Clone)]
pub struct IdentityDeriver {
    component_dir: PathBuf,
    extension: String,
    prefix: String,
}

impl IdentityDeriver {
    /// Creates a deriver placing artifacts in `component_dir` with the given extension.
    pub fn new(
        component_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        let prefix = sanitize(&prefix.into());
        // Identifiers must not start with a digit
        let prefix = match prefix.chars().next() {
            Some(c) if !c.is_ascii_digit() => prefix,
            _ => format!("_{prefix}"),
        };

        Self {
            component_dir: component_dir.into(),
            extension: extension.into(),
            prefix,
        }
    }

    /// Directory holding component artifacts.
    pub fn component_dir(&self) -> &Path {
        &self.component_dir
    }

    /// Artifact file extension (without the dot).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Derives the identity of a `(tag, namespace, version)` triple.
    pub fn derive(&self, tag_name: &str, namespace: &str, version: &str) -> ComponentIdentity {
        let identifier = format!(
            "{}{}_{}",
            self.prefix,
            sanitize(&format!("{tag_name}{namespace}{version}")),
            triple_digest(tag_name, namespace, version)
        );
        let path = self.component_dir.join(format!("{identifier}.{}", self.extension));

        ComponentIdentity {
            identifier,
            path,
        }
    }

    /// Derives the identity of a reference.
    pub fn derive_reference(&self, reference: &ComponentReference) -> ComponentIdentity {
        self.derive(&reference.tag_name, &reference.namespace, &reference.version)
    }

    /// Path of the companion module holding a pre-compiled runtime.
    ///
    /// Companion modules are plain JavaScript in every dialect.
    pub fn companion_path(&self, identity: &ComponentIdentity) -> PathBuf {
        self.component_dir.join(format!("{}{COMPILED_CODE_SUFFIX}.js", identity.identifier))
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$').collect()
}

fn triple_digest(tag_name: &str, namespace: &str, version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(namespace.as_bytes());
    hasher.update([0u8]);
    hasher.update(version.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..IDENTIFIER_DIGEST_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver() -> IdentityDeriver {
        IdentityDeriver::new("/proj/.cloudcom/com", "js", "CloudComponent")
    }

    #[test]
    fn test_parse_definition() {
        assert_eq!(parse_definition("ns@1.0.0"), Some(("ns", "1.0.0")));
        assert_eq!(parse_definition("bad"), None);
        assert_eq!(parse_definition(""), None);
        assert_eq!(parse_definition("ns@"), None);
        assert_eq!(parse_definition("@1"), None);
        assert_eq!(parse_definition("a@b@c"), None);
    }

    #[test]
    fn test_derive_is_idempotent() {
        let d = deriver();
        let a = d.derive("Widget", "ns", "1.0.0");
        let b = d.derive("Widget", "ns", "1.0.0");
        assert_eq!(a, b);
        assert!(a.identifier.starts_with("CloudComponentWidgetns100_"));
        assert_eq!(a.identifier.len(), "CloudComponentWidgetns100_".len() + IDENTIFIER_DIGEST_LEN);
        assert_eq!(a.path, PathBuf::from(format!("/proj/.cloudcom/com/{}.js", a.identifier)));
    }

    #[test]
    fn test_derive_keeps_stripped_collisions_apart() {
        let d = deriver();
        let a = d.derive("Widget", "a-b", "1.0");
        let b = d.derive("Widget", "ab", "10");
        assert_ne!(a.identifier, b.identifier);
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn test_derive_depends_on_owning_tag() {
        let d = deriver();
        assert_ne!(d.derive("Widget", "ns", "1").identifier, d.derive("Panel", "ns", "1").identifier);
    }

    #[test]
    fn test_identifier_is_valid_symbol() {
        let d = IdentityDeriver::new("/x", "vue", "9-prefix");
        let id = d.derive("my-tag", "@scope/pkg", "1.0.0-beta.1").identifier;
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'));
        assert!(!id.chars().next().unwrap().is_ascii_digit());
    }

    #[test]
    fn test_child_reference_inherits_tag() {
        let parent = ComponentReference::new("Widget", "ns", "1");
        let child = parent.child(&DependencyDescriptor::new("dep", "2"));
        assert_eq!(child, ComponentReference::new("Widget", "dep", "2"));
        assert_eq!(child.registry_key(), "dep-2");
    }

    #[test]
    fn test_companion_path() {
        let d = deriver();
        let identity = d.derive("Widget", "ns", "1");
        assert_eq!(
            d.companion_path(&identity),
            PathBuf::from(format!("/proj/.cloudcom/com/{}CompiledCode.js", identity.identifier))
        );
    }
}
