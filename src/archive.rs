// src/archive.rs

//! Patch archives
//!
//! A patch is a gzip-compressed tar of the workspace layout. Entries are added
//! in sorted order with a fixed mtime, so the same workspace always yields the
//! same archive bytes.
//!
//! [`ArchiveMerger`] folds a previously generated cumulative patch into the
//! one being generated, as if the previous patch had been applied first.

use crate::content::{ContentItem, ContentModification, ModificationType};
use crate::error::{Error, IoResultExt, Result};
use crate::patch::{PatchElement, PatchIdentity, PatchMetadata, META_INF_DIR};
use crate::spec::PatchType;
use crate::writer::{copy_tree, element_content_path, misc_content_path};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default mtime for archive entries (2024-01-01 00:00:00 UTC)
const DEFAULT_MTIME: u64 = 1704067200;

/// Packs a workspace into the output archive
pub trait Archiver {
    fn archive(&self, source: &Path, output: &Path) -> Result<()>;
}

/// `.tar.gz` archiver
#[derive(Debug, Clone, Copy)]
pub struct TarArchiver {
    mtime: u64,
}

impl TarArchiver {
    /// Archiver stamping entries with `SOURCE_DATE_EPOCH` when set
    pub fn new() -> Self {
        let mtime = std::env::var("SOURCE_DATE_EPOCH")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MTIME);
        Self { mtime }
    }

    fn write_archive<W: Write>(&self, source: &Path, writer: W) -> io::Result<()> {
        let encoder = GzEncoder::new(writer, Compression::default());
        let mut archive = tar::Builder::new(encoder);

        for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let relative = crate::distribution::relative_path(source, entry.path());
            let file_type = entry.file_type();

            let mut header = tar::Header::new_gnu();
            header.set_mtime(self.mtime);
            if file_type.is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                header.set_cksum();
                archive.append_data(&mut header, format!("{}/", relative), io::empty())?;
            } else if file_type.is_file() {
                let content = fs::read(entry.path())?;
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(file_mode(&entry.metadata().map_err(io::Error::from)?));
                header.set_size(content.len() as u64);
                header.set_cksum();
                archive.append_data(&mut header, &relative, content.as_slice())?;
            }
        }

        let encoder = archive.into_inner()?;
        encoder.finish()?;
        Ok(())
    }
}

impl Default for TarArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Archiver for TarArchiver {
    /// Writes to a temporary sibling of `output` and renames it into place,
    /// so a failed run leaves whatever was at `output` untouched
    fn archive(&self, source: &Path, output: &Path) -> Result<()> {
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).at_path(parent)?;

        let mut staged = tempfile::Builder::new()
            .prefix(".patchgen-")
            .suffix(".partial")
            .tempfile_in(parent)
            .at_path(parent)?;
        self.write_archive(source, staged.as_file_mut())
            .at_path(output)?;
        staged
            .persist(output)
            .map_err(|e| Error::io(output, e.error))?;

        info!("Created patch archive {}", output.display());
        Ok(())
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

/// Unpack a `.tar.gz` patch into `target`
pub fn unpack(archive: &Path, target: &Path) -> Result<()> {
    let file = File::open(archive).at_path(archive)?;
    fs::create_dir_all(target).at_path(target)?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(target)
        .at_path(archive)
}

/// Combines a previous patch with the one being generated
pub trait PatchMerger {
    /// Merge `previous` (an archive) with the patch in `workspace`, writing the
    /// result to `output`
    fn merge(&self, previous: &Path, workspace: &Path, output: &Path) -> Result<PatchMetadata>;
}

/// Merger working on unpacked archives in a temporary directory
#[derive(Debug, Clone, Default)]
pub struct ArchiveMerger<A: Archiver = TarArchiver> {
    archiver: A,
}

impl<A: Archiver> ArchiveMerger<A> {
    pub fn new(archiver: A) -> Self {
        Self { archiver }
    }
}

impl<A: Archiver> PatchMerger for ArchiveMerger<A> {
    fn merge(&self, previous: &Path, workspace: &Path, output: &Path) -> Result<PatchMetadata> {
        let staging = tempfile::Builder::new()
            .prefix("patchgen-merge-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let previous_dir = staging.path().join("previous");
        let merged_dir = staging.path().join("merged");

        unpack(previous, &previous_dir)?;
        let previous_meta = PatchMetadata::read_from(&previous_dir)?;
        let new_meta = PatchMetadata::read_from(workspace)?;
        info!(
            "Merging previous patch {} into {}",
            previous_meta.id, new_meta.id
        );

        let merged = merge_metadata(&previous_meta, &new_meta)?;

        fs::create_dir_all(merged_dir.join(META_INF_DIR)).at_path(&merged_dir)?;
        for entry in &merged.content {
            let source_root = match entry.origin {
                Origin::Previous => previous_dir.as_path(),
                Origin::New => workspace,
            };
            let source = source_root.join(&entry.source);
            if !source.exists() {
                return Err(Error::io(
                    &source,
                    io::Error::new(io::ErrorKind::NotFound, "patch content missing"),
                ));
            }
            copy_tree(&source, &merged_dir.join(&entry.target))?;
        }
        merged.metadata.write_to(&merged_dir)?;

        self.archiver.archive(&merged_dir, output)?;
        Ok(merged.metadata)
    }
}

/// Which patch a piece of merged content comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Previous,
    New,
}

/// Content to carry into the merged patch, paths relative to patch roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedContent {
    pub origin: Origin,
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Outcome of [`merge_metadata`]
#[derive(Debug, Clone)]
pub struct MergedPatch {
    pub metadata: PatchMetadata,
    pub content: Vec<MergedContent>,
}

/// Merge metadata of a previous cumulative patch with a new patch
///
/// Fails with a compatibility error unless the previous patch is cumulative,
/// for the same product, and ends at the version the new patch starts from.
pub fn merge_metadata(previous: &PatchMetadata, new: &PatchMetadata) -> Result<MergedPatch> {
    check_compatible(&previous.identity, &new.identity)?;

    let identity = PatchIdentity {
        name: new.identity.name.clone(),
        applies_to_version: previous.identity.applies_to_version.clone(),
        patch_type: PatchType::Cumulative,
        resulting_version: Some(
            new.identity
                .resulting_version
                .clone()
                .unwrap_or_else(|| new.identity.applies_to_version.clone()),
        ),
    };

    let mut content = Vec::new();

    let misc = merge_modifications(&previous.misc, &new.misc);
    for (modification, origin) in &misc {
        if let Some(path) = misc_content_path(modification).filter(|_| modification.carries_content()) {
            content.push(MergedContent {
                origin: *origin,
                source: path.clone(),
                target: path,
            });
        }
    }

    let mut elements = Vec::new();

    for prev in &previous.elements {
        let matching = new.elements.iter().find(|e| e.layer == prev.layer);
        let (template, modifications) = match matching {
            Some(current) => (current, merge_modifications(&prev.modifications, &current.modifications)),
            None => (
                prev,
                prev.modifications
                    .iter()
                    .cloned()
                    .map(|m| (m, Origin::Previous))
                    .collect(),
            ),
        };
        if let Some(element) = merged_element(template, prev, matching, modifications, &mut content) {
            elements.push(element);
        }
    }
    for current in new.elements.iter().filter(|e| {
        !previous.elements.iter().any(|p| p.layer == e.layer)
    }) {
        let modifications = current
            .modifications
            .iter()
            .cloned()
            .map(|m| (m, Origin::New))
            .collect();
        if let Some(element) = merged_element(current, current, Some(current), modifications, &mut content) {
            elements.push(element);
        }
    }
    debug!("Merged patch has {} elements", elements.len());

    Ok(MergedPatch {
        metadata: PatchMetadata {
            id: new.id.clone(),
            description: new.description.clone(),
            identity,
            elements,
            misc: misc.into_iter().map(|(m, _)| m).collect(),
        },
        content,
    })
}

fn check_compatible(previous: &PatchIdentity, new: &PatchIdentity) -> Result<()> {
    if previous.patch_type != PatchType::Cumulative {
        return Err(Error::CompatibilityError(format!(
            "previous patch is {}, only cumulative patches can be combined",
            previous.patch_type
        )));
    }
    if previous.name != new.name {
        return Err(Error::CompatibilityError(format!(
            "previous patch is for {}, new patch is for {}",
            previous.name, new.name
        )));
    }
    let previous_result = previous.resulting_version.as_deref().unwrap_or_default();
    if previous_result != new.applies_to_version {
        return Err(Error::CompatibilityError(format!(
            "previous patch results in {}, new patch applies to {}",
            previous_result, new.applies_to_version
        )));
    }
    Ok(())
}

/// Build a merged element and record where its content comes from
///
/// The merged element takes its id from the new side when there is one.
fn merged_element(
    template: &PatchElement,
    previous: &PatchElement,
    current: Option<&PatchElement>,
    modifications: Vec<(ContentModification, Origin)>,
    content: &mut Vec<MergedContent>,
) -> Option<PatchElement> {
    if modifications.is_empty() {
        return None;
    }

    for (modification, origin) in &modifications {
        if !modification.carries_content() {
            continue;
        }
        let source_dir = match origin {
            Origin::Previous => previous.content_dir(),
            Origin::New => current.map(|c| c.content_dir()).unwrap_or(previous.content_dir()),
        };
        if let (Some(source), Some(target)) = (
            element_content_path(source_dir, &modification.item),
            element_content_path(template.content_dir(), &modification.item),
        ) {
            content.push(MergedContent {
                origin: *origin,
                source,
                target,
            });
        }
    }

    Some(PatchElement {
        id: template.id.clone(),
        layer: template.layer.clone(),
        add_on: template.add_on,
        description: template.description.clone(),
        patch_type: template.patch_type,
        style: template.style,
        modifications: modifications.into_iter().map(|(m, _)| m).collect(),
    })
}

/// Merge two modification lists, previous entries first
fn merge_modifications(
    previous: &[ContentModification],
    new: &[ContentModification],
) -> Vec<(ContentModification, Origin)> {
    let find_new = |item: &ContentItem| new.iter().find(|m| &m.item == item);
    let mut merged = Vec::new();

    for prev in previous {
        match find_new(&prev.item) {
            None => merged.push((prev.clone(), Origin::Previous)),
            Some(current) => {
                if let Some(combined) = combine(prev, current) {
                    merged.push((combined, Origin::New));
                } else {
                    debug!("{} added then removed, dropped from merged patch", prev.item);
                }
            }
        }
    }

    for current in new {
        if !previous.iter().any(|p| p.item == current.item) {
            merged.push((current.clone(), Origin::New));
        }
    }

    merged
}

/// Combine the previous and new modification of the same item
///
/// `None` means the item cancels out.
fn combine(previous: &ContentModification, new: &ContentModification) -> Option<ContentModification> {
    use ModificationType::{Add, Modify, Remove};

    let mut combined = new.clone();
    match (previous.kind, new.kind) {
        (Add, Modify) => {
            combined.kind = Add;
            combined.existing_hash = None;
        }
        (Add, Remove) => return None,
        (Modify, Modify) | (Modify, Remove) => {
            combined.existing_hash = previous.existing_hash.clone();
        }
        (Remove, Add) => {
            combined.kind = Modify;
            combined.existing_hash = previous.existing_hash.clone();
        }
        (before, after) => {
            warn!(
                "Unexpected {:?} after {:?} for {}, keeping the new modification",
                after, before, new.item
            );
        }
    }
    Some(combined)
}
