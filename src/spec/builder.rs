// src/spec/builder.rs

//! Builders for [`PatchSpec`]
//!
//! Structural invariants are checked eagerly, when the offending call is made,
//! so a document parser can point at the exact entry that broke them.

use super::{
    normalize_path, ContentFilterPolicy, CumulativeRenameSpec, ElementContentFilter, ElementSpec,
    OptionalPathSpec, PatchSpec, PatchType,
};
use crate::content::ContentItem;
use crate::error::{Error, Result};
use crate::patch::{META_INF_DIR, MISC_DIR};
use std::collections::BTreeSet;
use tracing::debug;
use uuid::Uuid;

/// Description used when the config does not provide one
pub const DEFAULT_DESCRIPTION: &str = "no patch description available";

/// Mutable accumulator for a [`PatchSpec`]
///
/// Single use: [`build`](Self::build) consumes the builder and moves its
/// collections into the [`PatchSpec`].
#[derive(Debug)]
pub struct PatchSpecBuilder {
    id: String,
    description: String,
    patch_type: Option<PatchType>,
    applies_to_name: Option<String>,
    applies_to_version: Option<String>,
    resulting_version: Option<String>,
    generate_by_diff: bool,
    runtime_use_items: BTreeSet<String>,
    specified_content: BTreeSet<ContentItem>,
    elements: Vec<ElementSpecBuilder>,
    optional_paths: Vec<OptionalPathSpec>,
    rename: Option<CumulativeRenameSpec>,
}

impl PatchSpecBuilder {
    /// Create a builder with a random patch id
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            patch_type: None,
            applies_to_name: None,
            applies_to_version: None,
            resulting_version: None,
            generate_by_diff: true,
            runtime_use_items: BTreeSet::new(),
            specified_content: BTreeSet::new(),
            elements: Vec::new(),
            optional_paths: Vec::new(),
            rename: None,
        }
    }

    pub fn set_patch_id(&mut self, id: impl Into<String>) -> Result<&mut Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::ConfigurationError("patch id must not be empty".to_string()));
        }
        self.id = id;
        Ok(self)
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }

    /// Make this a cumulative patch upgrading `applies_to_version` to `resulting_version`
    pub fn set_cumulative_type(
        &mut self,
        applies_to_version: impl Into<String>,
        resulting_version: impl Into<String>,
    ) -> Result<&mut Self> {
        self.ensure_type_unset(PatchType::Cumulative)?;
        self.patch_type = Some(PatchType::Cumulative);
        self.applies_to_version = Some(applies_to_version.into()).filter(|v| !v.is_empty());
        self.resulting_version = Some(resulting_version.into()).filter(|v| !v.is_empty());
        Ok(self)
    }

    /// Make this a one-off patch for `applies_to_version`
    pub fn set_one_off_type(&mut self, applies_to_version: impl Into<String>) -> Result<&mut Self> {
        let applies_to_version = applies_to_version.into();
        if applies_to_version.trim().is_empty() {
            return Err(Error::ConfigurationError(
                "one-off patch requires a non-empty applies-to version".to_string(),
            ));
        }
        self.ensure_type_unset(PatchType::OneOff)?;
        self.patch_type = Some(PatchType::OneOff);
        self.applies_to_version = Some(applies_to_version);
        Ok(self)
    }

    fn ensure_type_unset(&self, requested: PatchType) -> Result<()> {
        match self.patch_type {
            Some(existing) => Err(Error::ConfigurationError(format!(
                "patch type already set to {}, cannot change it to {}",
                existing, requested
            ))),
            None => Ok(()),
        }
    }

    pub fn set_applies_to_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.applies_to_name = Some(name.into()).filter(|n| !n.is_empty());
        self
    }

    pub fn set_generate_by_diff(&mut self, generate_by_diff: bool) -> &mut Self {
        self.generate_by_diff = generate_by_diff;
        self
    }

    pub fn add_runtime_use_item(&mut self, item: impl Into<String>) -> &mut Self {
        self.runtime_use_items.insert(normalize_path(&item.into()));
        self
    }

    /// Add an item to the allowlist used when `generate_by_diff` is off
    pub fn add_specified_content(&mut self, item: ContentItem) -> &mut Self {
        self.specified_content.insert(item);
        self
    }

    /// Register a layer/add-on and return its builder
    ///
    /// Fails with [`Error::DuplicateElementError`] if `name` is already
    /// registered; existing registrations are left as they were.
    pub fn add_element(&mut self, name: impl Into<String>) -> Result<&mut ElementSpecBuilder> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::ConfigurationError(
                "layer name must not be empty".to_string(),
            ));
        }
        if self.elements.iter().any(|e| e.name == name) {
            return Err(Error::DuplicateElementError(name));
        }

        debug!("Registered element {}", name);
        self.elements.push(ElementSpecBuilder::new(name));
        let last = self.elements.len() - 1;
        Ok(&mut self.elements[last])
    }

    /// Look up an already registered element for further configuration
    pub fn element_mut(&mut self, name: &str) -> Option<&mut ElementSpecBuilder> {
        self.elements.iter_mut().find(|e| e.name == name)
    }

    /// Append an optional path; order is significant for `requires`
    pub fn add_optional_path(
        &mut self,
        path: impl Into<String>,
        requires: Option<String>,
    ) -> &mut Self {
        self.optional_paths.push(OptionalPathSpec::new(path, requires));
        self
    }

    /// Attach rename metadata (not checked against the patch type here)
    pub fn set_rename(
        &mut self,
        name: impl Into<String>,
        applies_to_version: impl Into<String>,
        resulting_version: impl Into<String>,
    ) -> &mut Self {
        self.rename = Some(CumulativeRenameSpec {
            name: name.into(),
            applies_to_version: applies_to_version.into(),
            resulting_version: resulting_version.into(),
        });
        self
    }

    pub fn patch_type(&self) -> Option<PatchType> {
        self.patch_type
    }

    /// Produce the immutable [`PatchSpec`]
    ///
    /// Element ids name directories inside the patch, so each must be a single
    /// safe path component, distinct from the reserved patch directories and
    /// from every other element id.
    pub fn build(self) -> Result<PatchSpec> {
        let patch_type = self.patch_type.ok_or_else(|| {
            Error::ConfigurationError(
                "patch type not set, configure either a one-off or a cumulative patch".to_string(),
            )
        })?;
        check_element_ids(&self.elements)?;

        Ok(PatchSpec {
            id: self.id,
            description: self.description,
            patch_type,
            applies_to_name: self.applies_to_name,
            applies_to_version: self.applies_to_version,
            resulting_version: self.resulting_version,
            content_policy: ContentFilterPolicy::new(self.generate_by_diff, self.specified_content),
            runtime_use_items: self.runtime_use_items,
            elements: self.elements.into_iter().map(ElementSpecBuilder::build).collect(),
            optional_paths: self.optional_paths,
            rename: self.rename,
        })
    }
}

fn check_element_ids(elements: &[ElementSpecBuilder]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for element in elements {
        if let Some(reason) = element_id_problem(&element.id) {
            return Err(Error::ConfigurationError(format!(
                "element id '{}' of layer {} {}",
                element.id, element.name, reason
            )));
        }
        if !seen.insert(element.id.as_str()) {
            return Err(Error::ConfigurationError(format!(
                "element id '{}' is used by more than one layer",
                element.id
            )));
        }
    }
    Ok(())
}

fn element_id_problem(id: &str) -> Option<&'static str> {
    if id.trim().is_empty() {
        Some("must not be empty")
    } else if id.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if id == "." || id.contains("..") {
        Some("must not contain '..' or be '.'")
    } else if [META_INF_DIR, MISC_DIR]
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(id))
    {
        Some("collides with a reserved patch directory")
    } else {
        None
    }
}

impl Default for PatchSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one layer/add-on entry
#[derive(Debug)]
pub struct ElementSpecBuilder {
    name: String,
    id: String,
    description: Option<String>,
    patch_type: Option<PatchType>,
    generate_by_diff: bool,
    specified_content: BTreeSet<ContentItem>,
}

impl ElementSpecBuilder {
    fn new(name: String) -> Self {
        let id = format!("{}-{}", name, Uuid::new_v4());
        Self {
            name,
            id,
            description: None,
            patch_type: None,
            generate_by_diff: true,
            specified_content: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.id = id.into();
        self
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Override the patch type for this layer only
    pub fn set_patch_type(&mut self, patch_type: PatchType) -> &mut Self {
        self.patch_type = Some(patch_type);
        self
    }

    pub fn set_generate_by_diff(&mut self, generate_by_diff: bool) -> &mut Self {
        self.generate_by_diff = generate_by_diff;
        self
    }

    /// Add a module/bundle to this layer's allowlist
    pub fn add_specified_content(&mut self, item: ContentItem) -> &mut Self {
        self.specified_content.insert(item);
        self
    }

    fn build(self) -> ElementSpec {
        ElementSpec {
            name: self.name,
            id: self.id,
            description: self.description,
            patch_type: self.patch_type,
            filter: ElementContentFilter::new(self.generate_by_diff, self.specified_content),
        }
    }
}
