// src/content.rs

//! Content items and modifications
//!
//! A content item is identified by its type plus identity fields: misc files by
//! (name, relative path), modules and bundles by (name, slot). Equality of the
//! identity, never object identity, decides allowlist matching and merging.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of content tracked in a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Module,
    Bundle,
    Misc,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Bundle => "bundle",
            Self::Misc => "misc",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a piece of patchable content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// A module directory, e.g. `org.jboss.as.server:main`
    Module { name: String, slot: String },
    /// A bundle directory, same identity rule as modules
    Bundle { name: String, slot: String },
    /// A single file tracked by path. `path` is the parent directory
    /// (`/`-separated, empty for the root) and `name` the file name.
    Misc { name: String, path: String },
}

impl ContentItem {
    pub fn module(name: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::Module {
            name: name.into(),
            slot: slot.into(),
        }
    }

    pub fn bundle(name: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::Bundle {
            name: name.into(),
            slot: slot.into(),
        }
    }

    /// Build a misc item from a `/`-separated path relative to the distribution root
    pub fn misc(relative_file: &str) -> Self {
        let trimmed = relative_file.trim_matches('/');
        match trimmed.rsplit_once('/') {
            Some((path, name)) => Self::Misc {
                name: name.to_string(),
                path: path.to_string(),
            },
            None => Self::Misc {
                name: trimmed.to_string(),
                path: String::new(),
            },
        }
    }

    /// Parse a `name:slot` module reference (slot defaults to `main`)
    pub fn parse_module_ref(reference: &str) -> Self {
        let (name, slot) = split_slot_ref(reference);
        Self::module(name, slot)
    }

    /// Parse a `name:slot` bundle reference (slot defaults to `main`)
    pub fn parse_bundle_ref(reference: &str) -> Self {
        let (name, slot) = split_slot_ref(reference);
        Self::bundle(name, slot)
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Module { .. } => ContentType::Module,
            Self::Bundle { .. } => ContentType::Bundle,
            Self::Misc { .. } => ContentType::Misc,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Module { name, .. } | Self::Bundle { name, .. } | Self::Misc { name, .. } => name,
        }
    }

    /// Relative file path of a misc item (`path/name`); `None` for modules/bundles
    pub fn relative_file(&self) -> Option<String> {
        match self {
            Self::Misc { name, path } if path.is_empty() => Some(name.clone()),
            Self::Misc { name, path } => Some(format!("{}/{}", path, name)),
            _ => None,
        }
    }

    /// Directory of a module/bundle relative to its layer root, e.g.
    /// `org/jboss/as/server/main`; `None` for misc items
    pub fn module_dir(&self) -> Option<String> {
        match self {
            Self::Module { name, slot } | Self::Bundle { name, slot } => {
                Some(format!("{}/{}", name.replace('.', "/"), slot))
            }
            Self::Misc { .. } => None,
        }
    }
}

impl fmt::Display for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module { name, slot } | Self::Bundle { name, slot } => {
                write!(f, "{} {}:{}", self.content_type(), name, slot)
            }
            Self::Misc { .. } => write!(
                f,
                "misc {}",
                self.relative_file().unwrap_or_default()
            ),
        }
    }
}

fn split_slot_ref(reference: &str) -> (&str, &str) {
    let reference = reference.trim();
    reference.split_once(':').unwrap_or((reference, "main"))
}

/// What happens to a content item when the patch is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationType {
    Add,
    Modify,
    Remove,
}

/// Marks a misc modification as living under an optional path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalCondition {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
}

/// One entry of the patch content: an item plus how it changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentModification {
    pub item: ContentItem,
    #[serde(rename = "modification")]
    pub kind: ModificationType,
    /// Digest in the applies-to distribution (modify/remove)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_hash: Option<String>,
    /// Digest in the updated distribution (add/modify)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub in_runtime_use: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<OptionalCondition>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ContentModification {
    pub fn added(item: ContentItem, new_hash: impl Into<String>) -> Self {
        Self::new(item, ModificationType::Add, None, Some(new_hash.into()))
    }

    pub fn modified(
        item: ContentItem,
        existing_hash: impl Into<String>,
        new_hash: impl Into<String>,
    ) -> Self {
        Self::new(
            item,
            ModificationType::Modify,
            Some(existing_hash.into()),
            Some(new_hash.into()),
        )
    }

    pub fn removed(item: ContentItem, existing_hash: impl Into<String>) -> Self {
        Self::new(item, ModificationType::Remove, Some(existing_hash.into()), None)
    }

    fn new(
        item: ContentItem,
        kind: ModificationType,
        existing_hash: Option<String>,
        new_hash: Option<String>,
    ) -> Self {
        Self {
            item,
            kind,
            existing_hash,
            new_hash,
            in_runtime_use: false,
            optional: None,
        }
    }

    /// Whether applying this modification needs content shipped in the patch
    pub fn carries_content(&self) -> bool {
        self.kind != ModificationType::Remove
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misc_identity_from_path() {
        let item = ContentItem::misc("bin/standalone.sh");
        assert_eq!(
            item,
            ContentItem::Misc {
                name: "standalone.sh".to_string(),
                path: "bin".to_string()
            }
        );
        assert_eq!(item.relative_file().as_deref(), Some("bin/standalone.sh"));

        let root = ContentItem::misc("README.txt");
        assert_eq!(root.relative_file().as_deref(), Some("README.txt"));
        assert_eq!(root, ContentItem::misc("/README.txt"));
    }

    #[test]
    fn test_module_dir() {
        let module = ContentItem::module("org.jboss.as.server", "main");
        assert_eq!(module.module_dir().as_deref(), Some("org/jboss/as/server/main"));
        assert_eq!(ContentItem::misc("a/b").module_dir(), None);
    }

    #[test]
    fn test_parse_module_ref() {
        assert_eq!(
            ContentItem::parse_module_ref("org.foo"),
            ContentItem::module("org.foo", "main")
        );
        assert_eq!(
            ContentItem::parse_module_ref("org.foo:1.2"),
            ContentItem::module("org.foo", "1.2")
        );
    }

    #[test]
    fn test_modification_serialization() {
        let mut m = ContentModification::modified(ContentItem::misc("bin/run.sh"), "aa", "bb");
        m.in_runtime_use = true;
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"modification\":\"modify\""));
        assert!(json.contains("\"type\":\"misc\""));
        assert!(!json.contains("optional"));

        let back: ContentModification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
