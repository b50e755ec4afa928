// src/patch/mod.rs

//! Patch metadata
//!
//! [`PatchMetadata`] is what a generated patch says about itself. It is
//! written to `META-INF/patch.json` inside the archive and read back when a
//! new patch is merged on top of a previous one.

mod assembly;
mod optional;

pub use assembly::{AssemblyOptions, AssemblyStrategy, PatchAssembler};
pub use optional::OptionalPathResolver;

use crate::content::ContentModification;
use crate::error::{IoResultExt, Result};
use crate::spec::PatchType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Directory holding the metadata inside a patch
pub const META_INF_DIR: &str = "META-INF";
/// Metadata file name inside [`META_INF_DIR`]
pub const METADATA_FILE: &str = "patch.json";
/// Directory holding misc file content inside a patch
pub const MISC_DIR: &str = "misc";

/// Product and versions a patch applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchIdentity {
    pub name: String,
    pub applies_to_version: String,
    pub patch_type: PatchType,
    /// Set for cumulative patches only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_version: Option<String>,
}

/// Patch content scoped to one layer or add-on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchElement {
    pub id: String,
    pub layer: String,
    #[serde(default)]
    pub add_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub patch_type: PatchType,
    pub style: AssemblyStrategy,
    pub modifications: Vec<ContentModification>,
}

impl PatchElement {
    /// Directory of this element's content inside a patch
    pub fn content_dir(&self) -> &str {
        &self.id
    }
}

/// Full description of a generated patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchMetadata {
    pub id: String,
    pub description: String,
    pub identity: PatchIdentity,
    #[serde(default)]
    pub elements: Vec<PatchElement>,
    #[serde(default)]
    pub misc: Vec<ContentModification>,
}

impl PatchMetadata {
    /// Location of the metadata file under a patch root
    pub fn path_in(root: &Path) -> std::path::PathBuf {
        root.join(META_INF_DIR).join(METADATA_FILE)
    }

    /// Read `META-INF/patch.json` from an unpacked patch
    pub fn read_from(root: &Path) -> Result<Self> {
        let path = Self::path_in(root);
        let content = std::fs::read_to_string(&path).at_path(&path)?;
        Self::from_json(&content)
    }

    /// Write `META-INF/patch.json` into a patch root
    pub fn write_to(&self, root: &Path) -> Result<()> {
        let path = Self::path_in(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).at_path(parent)?;
        }
        std::fs::write(&path, self.to_json()?).at_path(&path)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn element_by_layer(&self, layer: &str) -> Option<&PatchElement> {
        self.elements.iter().find(|e| e.layer == layer)
    }

    /// Number of modifications across misc and all elements
    pub fn modification_count(&self) -> usize {
        self.misc.len()
            + self
                .elements
                .iter()
                .map(|e| e.modifications.len())
                .sum::<usize>()
    }
}
