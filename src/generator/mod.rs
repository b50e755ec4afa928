// src/generator/mod.rs

//! Patch generation pipeline
//!
//! The orchestrator runs one generation from a [`PatchSpec`] and two
//! distribution roots:
//!
//! 1. allocate a scratch workspace
//! 2. load both distributions and check they fit together
//! 3. compare them and assemble patch metadata layer by layer
//! 4. write content into the workspace
//! 5. archive the workspace, or merge it with a previous patch
//!
//! Configuration and compatibility problems surface before any content is
//! written. The workspace is removed however the run ends, and the output
//! path is only replaced once a complete archive exists.

mod request;
mod workspace;

pub use request::{GenerationOptions, GenerationRequest, ValidatedRequest};
pub use workspace::ScratchWorkspace;

use crate::archive::{ArchiveMerger, Archiver, PatchMerger, TarArchiver};
use crate::distribution::{
    compare, ComparisonScope, Distribution, DistributionLoader, FsDistributionLoader, LayerScope,
};
use crate::error::{Error, Result};
use crate::patch::{AssemblyOptions, PatchAssembler, PatchMetadata};
use crate::spec::{document, PatchSpec, PatchType};
use crate::writer::{ContentWriter, FsContentWriter};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub output: PathBuf,
    pub metadata: PatchMetadata,
    /// Whether a previous patch was merged in
    pub merged: bool,
}

impl GenerationReport {
    pub fn patch_id(&self) -> &str {
        &self.metadata.id
    }

    pub fn patch_type(&self) -> PatchType {
        self.metadata.identity.patch_type
    }
}

/// Drives a generation run through its collaborators
pub struct GenerationOrchestrator<L, W, A, M> {
    loader: L,
    writer: W,
    archiver: A,
    merger: M,
}

impl GenerationOrchestrator<FsDistributionLoader, FsContentWriter, TarArchiver, ArchiveMerger> {
    /// Orchestrator working on the local filesystem with `.tar.gz` output
    pub fn new() -> Self {
        Self::with_components(
            FsDistributionLoader::new(),
            FsContentWriter::new(),
            TarArchiver::new(),
            ArchiveMerger::new(TarArchiver::new()),
        )
    }
}

impl Default for GenerationOrchestrator<FsDistributionLoader, FsContentWriter, TarArchiver, ArchiveMerger> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, W, A, M> GenerationOrchestrator<L, W, A, M>
where
    L: DistributionLoader,
    W: ContentWriter,
    A: Archiver,
    M: PatchMerger,
{
    pub fn with_components(loader: L, writer: W, archiver: A, merger: M) -> Self {
        Self {
            loader,
            writer,
            archiver,
            merger,
        }
    }

    /// Validate `request`, load its patch config and generate
    pub fn run(&self, request: GenerationRequest) -> Result<GenerationReport> {
        let request = request.validate()?;
        let spec = document::load_spec(&request.patch_config)?;
        self.generate(spec, &request)
    }

    /// Generate a patch for an already built [`PatchSpec`]
    pub fn generate(&self, spec: PatchSpec, request: &ValidatedRequest) -> Result<GenerationReport> {
        let options = &request.options;
        info!(
            "Generating {} patch {} ({} -> {})",
            spec.patch_type(),
            spec.id(),
            request.applies_to_dist.display(),
            request.updated_dist.display()
        );

        let workspace = ScratchWorkspace::create(&options.work_dir, spec.id())?;

        let scope = comparison_scope(&spec, options);
        let base = self.loader.load(&request.applies_to_dist, &scope)?;
        let updated = self.loader.load(&request.updated_dist, &scope)?;
        check_identities(&spec, &base, &updated)?;

        let diff = compare(&base, &updated, &scope);
        debug!("Comparison found {} changes", diff.modification_count());

        let assembler = PatchAssembler::new(
            &spec,
            AssemblyOptions {
                misc_allowlist: options.misc_allowlist.clone(),
                strict_layers: options.strict_layers,
            },
        );
        let metadata = assembler.assemble(&base, &updated, diff)?;

        self.writer
            .write(workspace.root(), &updated.root, &metadata)?;

        let output = &request.output_file;
        let (metadata, merged) = match &request.combine_with {
            Some(previous) => (self.merger.merge(previous, workspace.root(), output)?, true),
            None => {
                self.archiver.archive(workspace.root(), output)?;
                (metadata, false)
            }
        };

        info!(
            "Patch {} written to {} ({} changes)",
            metadata.id,
            output.display(),
            metadata.modification_count()
        );
        Ok(GenerationReport {
            output: output.clone(),
            metadata,
            merged,
        })
    }
}

/// Exclusions, depth and visited layers for one run
fn comparison_scope(spec: &PatchSpec, options: &GenerationOptions) -> ComparisonScope {
    // Cumulative patches always carry the version modules
    let include_version = spec.patch_type() == PatchType::Cumulative || options.include_version;
    let mut scope = ComparisonScope::new(include_version, options.depth);
    if options.skip_layers_without_config {
        scope.layers = LayerScope::Only(
            spec.elements()
                .iter()
                .map(|e| e.name().to_string())
                .collect(),
        );
    }
    scope
}

/// Both trees must be the same product, matching what the patch config declares
fn check_identities(spec: &PatchSpec, base: &Distribution, updated: &Distribution) -> Result<()> {
    if base.name() != updated.name() {
        return Err(Error::CompatibilityError(format!(
            "distributions are different products: {} and {}",
            base.name(),
            updated.name()
        )));
    }
    if let Some(name) = spec.applies_to_name()
        && name != base.name()
    {
        return Err(Error::CompatibilityError(format!(
            "patch applies to {}, but the applies-to distribution is {}",
            name,
            base.name()
        )));
    }
    if let Some(version) = spec.applies_to_version()
        && version != base.version()
    {
        return Err(Error::CompatibilityError(format!(
            "patch applies to version {}, but the applies-to distribution is {}",
            version,
            base.version()
        )));
    }

    if spec.patch_type() == PatchType::Cumulative {
        if base.version() == updated.version() {
            warn!(
                "Cumulative patch with identical versions ({}) on both sides",
                base.version()
            );
        }
        if let Some(resulting) = spec.resulting_version()
            && resulting != updated.version()
        {
            warn!(
                "Declared resulting version {} differs from updated distribution version {}",
                resulting,
                updated.version()
            );
        }
    }
    Ok(())
}
