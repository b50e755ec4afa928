// src/spec/mod.rs

//! Patch specification model
//!
//! A [`PatchSpec`] is the immutable description of what a generation run should
//! produce. It is created once by [`PatchSpecBuilder::build`], which consumes the
//! builder, so nothing mutated afterwards can leak into an already-built spec.
//!
//! # Structure
//!
//! - **PatchSpec**: id, description, patch type, target identity, content policy
//! - **ElementSpec**: per layer/add-on id, description, type override, filter
//! - **OptionalPathSpec**: ordered optional paths with `requires` edges
//! - **CumulativeRenameSpec**: identity a cumulative patch is presented under

mod builder;
pub mod document;
pub mod filter;

pub use builder::{ElementSpecBuilder, PatchSpecBuilder, DEFAULT_DESCRIPTION};
pub use document::PatchConfigDocument;
pub use filter::{
    ContentFilter, ContentFilterPolicy, ElementContentFilter, FilterChain, MiscFileAllowlist,
};

use crate::content::ContentItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Patch type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchType {
    /// Fix that keeps the declared baseline version
    OneOff,
    /// Upgrade from `applies_to_version` to `resulting_version`
    Cumulative,
}

impl PatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneOff => "one-off",
            Self::Cumulative => "cumulative",
        }
    }
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "one-off" | "oneoff" => Ok(Self::OneOff),
            "cumulative" | "cp" => Ok(Self::Cumulative),
            other => Err(crate::Error::ConfigurationError(format!(
                "unknown patch type '{}', expected one-off or cumulative",
                other
            ))),
        }
    }
}

/// Configuration scoped to one layer or add-on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub(crate) name: String,
    pub(crate) id: String,
    pub(crate) description: Option<String>,
    pub(crate) patch_type: Option<PatchType>,
    pub(crate) filter: ElementContentFilter,
}

impl ElementSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Locally configured type, `None` when deferring to the patch
    pub fn patch_type(&self) -> Option<PatchType> {
        self.patch_type
    }

    /// Type used at assembly time: the local one, else the parent's
    pub fn effective_patch_type(&self, parent: PatchType) -> PatchType {
        self.patch_type.unwrap_or(parent)
    }

    pub fn filter(&self) -> &ElementContentFilter {
        &self.filter
    }
}

/// Optional path with an optional dependency on an earlier one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalPathSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
}

impl OptionalPathSpec {
    pub fn new(path: impl Into<String>, requires: Option<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            requires: requires.map(|r| normalize_path(&r)),
        }
    }
}

/// Identity a cumulative patch is presented under
///
/// Only the metadata changes; comparison and validation still use the real
/// identity of the distributions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeRenameSpec {
    pub name: String,
    pub applies_to_version: String,
    pub resulting_version: String,
}

/// Immutable patch specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    pub(crate) id: String,
    pub(crate) description: String,
    pub(crate) patch_type: PatchType,
    pub(crate) applies_to_name: Option<String>,
    pub(crate) applies_to_version: Option<String>,
    pub(crate) resulting_version: Option<String>,
    pub(crate) content_policy: ContentFilterPolicy,
    pub(crate) runtime_use_items: BTreeSet<String>,
    pub(crate) elements: Vec<ElementSpec>,
    pub(crate) optional_paths: Vec<OptionalPathSpec>,
    pub(crate) rename: Option<CumulativeRenameSpec>,
}

impl PatchSpec {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn patch_type(&self) -> PatchType {
        self.patch_type
    }

    pub fn applies_to_name(&self) -> Option<&str> {
        self.applies_to_name.as_deref()
    }

    pub fn applies_to_version(&self) -> Option<&str> {
        self.applies_to_version.as_deref()
    }

    /// Declared resulting version; only meaningful for cumulative patches
    pub fn resulting_version(&self) -> Option<&str> {
        match self.patch_type {
            PatchType::Cumulative => self.resulting_version.as_deref(),
            PatchType::OneOff => None,
        }
    }

    pub fn generate_by_diff(&self) -> bool {
        self.content_policy.generate_by_diff()
    }

    pub fn content_policy(&self) -> &ContentFilterPolicy {
        &self.content_policy
    }

    pub fn explicit_content(&self) -> &BTreeSet<ContentItem> {
        self.content_policy.explicit_items()
    }

    pub fn runtime_use_items(&self) -> &BTreeSet<String> {
        &self.runtime_use_items
    }

    /// Elements in registration order
    pub fn elements(&self) -> &[ElementSpec] {
        &self.elements
    }

    pub fn element(&self, name: &str) -> Option<&ElementSpec> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Optional paths in insertion order
    pub fn optional_paths(&self) -> &[OptionalPathSpec] {
        &self.optional_paths
    }

    pub fn rename(&self) -> Option<&CumulativeRenameSpec> {
        self.rename.as_ref()
    }
}

/// Normalise a relative path: `/` separators, no leading/trailing slash
pub(crate) fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_matches('/').to_string()
}
