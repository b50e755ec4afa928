// src/lib.rs

//! patchgen
//!
//! Generates patches describing the difference between two versions of a
//! modular server distribution, driven by a declarative patch config.
//!
//! # Architecture
//!
//! - Spec: an immutable [`PatchSpec`] built once from the patch config
//! - Distribution: layers, add-ons and misc files compared by digest
//! - Assembly: per-layer strategy (upgrade or standalone) and content filters
//! - Generator: one-shot pipeline with a scratch workspace that never outlives it
//! - Archive: `.tar.gz` output, optionally merged with a previous cumulative patch

pub mod archive;
pub mod content;
pub mod distribution;
mod error;
pub mod generator;
pub mod hash;
pub mod patch;
pub mod spec;
pub mod writer;

pub use archive::{ArchiveMerger, Archiver, PatchMerger, TarArchiver};
pub use content::{ContentItem, ContentModification, ContentType, ModificationType};
pub use distribution::{
    ComparisonScope, Distribution, DistributionLoader, FsDistributionLoader, InspectionDepth,
    ProductIdentity,
};
pub use error::{Error, Result};
pub use generator::{GenerationOrchestrator, GenerationReport, GenerationRequest};
pub use patch::{AssemblyStrategy, PatchMetadata};
pub use spec::{PatchSpec, PatchSpecBuilder, PatchType};
pub use writer::{ContentWriter, FsContentWriter};
