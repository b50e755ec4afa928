// src/writer.rs

//! Populating a patch workspace
//!
//! Layout written under the workspace root:
//!
//! ```text
//! META-INF/patch.json
//! misc/<relative path>
//! <element id>/modules/<module path>/<slot>/...
//! <element id>/bundles/<bundle path>/<slot>/...
//! ```

use crate::content::{ContentItem, ContentModification, ContentType};
use crate::distribution::LayerKind;
use crate::error::{Error, IoResultExt, Result};
use crate::patch::{PatchElement, PatchMetadata, MISC_DIR};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Element sub-directory holding module content
pub const ELEMENT_MODULES_DIR: &str = "modules";
/// Element sub-directory holding bundle content
pub const ELEMENT_BUNDLES_DIR: &str = "bundles";

/// Writes patch content and metadata into a workspace
pub trait ContentWriter {
    /// Copy everything `patch` adds or modifies from `source_root`
    /// (the updated distribution) and write the metadata
    fn write(&self, workspace: &Path, source_root: &Path, patch: &PatchMetadata) -> Result<()>;
}

/// Writer copying from a distribution on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsContentWriter;

impl FsContentWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ContentWriter for FsContentWriter {
    fn write(&self, workspace: &Path, source_root: &Path, patch: &PatchMetadata) -> Result<()> {
        let mut copied = 0usize;

        for modification in patch.misc.iter().filter(|m| m.carries_content()) {
            if let Some(relative) = modification.item.relative_file() {
                copy_file(
                    &source_root.join(&relative),
                    &workspace.join(MISC_DIR).join(&relative),
                )?;
                copied += 1;
            }
        }

        for element in &patch.elements {
            for modification in element.modifications.iter().filter(|m| m.carries_content()) {
                let (source, target) = element_paths(element, &modification.item)
                    .map(|(src, dst)| (source_root.join(src), workspace.join(dst)))
                    .ok_or_else(|| {
                        Error::ConfigurationError(format!(
                            "{} can not be part of element {}",
                            modification.item, element.layer
                        ))
                    })?;
                copy_tree(&source, &target)?;
                copied += 1;
            }
        }

        patch.write_to(workspace)?;
        info!("Wrote {} content entries to {}", copied, workspace.display());
        Ok(())
    }
}

/// Source path (relative to a distribution root) and target path (relative to
/// a patch root) of a module/bundle modification
pub(crate) fn element_paths(
    element: &PatchElement,
    item: &ContentItem,
) -> Option<(PathBuf, PathBuf)> {
    let kind = if element.add_on {
        LayerKind::AddOn
    } else {
        LayerKind::Layer
    };
    let dir = item.module_dir()?;
    match item.content_type() {
        ContentType::Module => Some((
            PathBuf::from(kind.modules_dir(&element.layer)).join(&dir),
            element_content_path(element.content_dir(), item)?,
        )),
        ContentType::Bundle => Some((
            PathBuf::from(kind.bundles_dir(&element.layer)?).join(&dir),
            element_content_path(element.content_dir(), item)?,
        )),
        ContentType::Misc => None,
    }
}

/// Where a module/bundle lives inside a patch root
pub(crate) fn element_content_path(element_dir: &str, item: &ContentItem) -> Option<PathBuf> {
    let sub = match item.content_type() {
        ContentType::Module => ELEMENT_MODULES_DIR,
        ContentType::Bundle => ELEMENT_BUNDLES_DIR,
        ContentType::Misc => return None,
    };
    Some(PathBuf::from(element_dir).join(sub).join(item.module_dir()?))
}

/// Where a misc file lives inside a patch root
pub(crate) fn misc_content_path(modification: &ContentModification) -> Option<PathBuf> {
    modification
        .item
        .relative_file()
        .map(|relative| PathBuf::from(MISC_DIR).join(relative))
}

fn copy_file(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    fs::copy(source, target).at_path(source)?;
    debug!("Copied {}", source.display());
    Ok(())
}

/// Recursively copy a directory (or a single file) to `target`
pub(crate) fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    if source.is_file() {
        return copy_file(source, target);
    }

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            Error::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).at_path(&destination)?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &destination)?;
        }
    }
    Ok(())
}
