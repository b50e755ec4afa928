// src/patch/assembly.rs

//! Turning a distribution comparison into patch metadata

use super::{PatchElement, PatchIdentity, PatchMetadata};
use crate::content::ContentModification;
use crate::distribution::{Distribution, DistributionDiff, LayerDiff};
use crate::error::{Error, Result};
use crate::patch::OptionalPathResolver;
use crate::spec::{ContentFilter, FilterChain, MiscFileAllowlist, PatchSpec, PatchType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How one layer's content is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyStrategy {
    /// Moves the layer to the resulting version (cumulative)
    Upgrade,
    /// Fix on top of the current version (one-off)
    Standalone,
}

impl AssemblyStrategy {
    pub fn for_type(patch_type: PatchType) -> Self {
        match patch_type {
            PatchType::Cumulative => Self::Upgrade,
            PatchType::OneOff => Self::Standalone,
        }
    }
}

/// Run-level knobs that are not part of the patch spec
#[derive(Debug, Clone, Default)]
pub struct AssemblyOptions {
    /// From `--skip-misc-files`, composed with the patch config's own policy
    pub misc_allowlist: Option<MiscFileAllowlist>,
    /// Fail instead of skipping layers that have no configuration
    pub strict_layers: bool,
}

/// Builds [`PatchMetadata`] for one [`PatchSpec`]
pub struct PatchAssembler<'a> {
    spec: &'a PatchSpec,
    options: AssemblyOptions,
    filters: FilterChain,
}

impl<'a> PatchAssembler<'a> {
    pub fn new(spec: &'a PatchSpec, options: AssemblyOptions) -> Self {
        let mut filters = FilterChain::new().with(Box::new(spec.content_policy().clone()));
        if let Some(allowlist) = &options.misc_allowlist {
            filters.add(Box::new(allowlist.clone()));
        }
        Self {
            spec,
            options,
            filters,
        }
    }

    /// Assemble the metadata for `diff`
    pub fn assemble(
        &self,
        base: &Distribution,
        updated: &Distribution,
        diff: DistributionDiff,
    ) -> Result<PatchMetadata> {
        let misc = self.assemble_misc(base, updated, diff.misc)?;

        let mut elements = Vec::new();
        for layer in diff.layers {
            if let Some(element) = self.assemble_layer(layer)? {
                elements.push(element);
            }
        }

        for element in self.spec.elements() {
            if !base.has_layer(element.name()) && !updated.has_layer(element.name()) {
                warn!("Configured layer {} not found in either distribution", element.name());
            }
        }

        let metadata = PatchMetadata {
            id: self.spec.id().to_string(),
            description: self.spec.description().to_string(),
            identity: self.identity(base, updated),
            elements,
            misc,
        };
        info!(
            "Assembled patch {}: {} misc changes, {} elements",
            metadata.id,
            metadata.misc.len(),
            metadata.elements.len()
        );
        Ok(metadata)
    }

    fn assemble_misc(
        &self,
        base: &Distribution,
        updated: &Distribution,
        misc: Vec<ContentModification>,
    ) -> Result<Vec<ContentModification>> {
        let runtime_use = self.spec.runtime_use_items();
        let accepted: Vec<_> = misc
            .into_iter()
            .filter(|m| self.accepts(m))
            .map(|mut m| {
                if let Some(file) = m.item.relative_file() {
                    m.in_runtime_use = runtime_use.contains(&file);
                }
                m
            })
            .collect();

        let resolver = OptionalPathResolver::resolve(self.spec.optional_paths(), |path| {
            base.has_path(path) || updated.has_path(path)
        })?;
        Ok(resolver.apply(accepted))
    }

    /// Resolve the element for one visited layer; `None` means omitted
    fn assemble_layer(&self, layer: LayerDiff) -> Result<Option<PatchElement>> {
        let Some(element) = self.spec.element(&layer.name) else {
            if self.options.strict_layers {
                return Err(Error::ConfigurationError(format!(
                    "{} {} has no configuration in the patch config",
                    layer.kind, layer.name
                )));
            }
            if !layer.modifications.is_empty() {
                warn!(
                    "No configuration for {} {}, its {} changes are left out",
                    layer.kind,
                    layer.name,
                    layer.modifications.len()
                );
            }
            return Ok(None);
        };

        let patch_type = element.effective_patch_type(self.spec.patch_type());
        let style = AssemblyStrategy::for_type(patch_type);

        let modifications: Vec<_> = layer
            .modifications
            .into_iter()
            .filter(|m| self.accepts(m) && element.filter().accepts(&m.item))
            .collect();

        if modifications.is_empty() {
            debug!("{} {} has no changes to ship", layer.kind, layer.name);
            return Ok(None);
        }

        debug!(
            "{} {}: {:?} with {} changes",
            layer.kind,
            layer.name,
            style,
            modifications.len()
        );
        Ok(Some(PatchElement {
            id: element.id().to_string(),
            layer: layer.name,
            add_on: layer.kind.is_add_on(),
            description: element.description().map(str::to_string),
            patch_type,
            style,
            modifications,
        }))
    }

    fn accepts(&self, modification: &ContentModification) -> bool {
        match self.filters.rejected_by(&modification.item) {
            None => true,
            Some(filter) => {
                debug!("{} rejected by {}", modification.item, filter);
                false
            }
        }
    }

    fn identity(&self, base: &Distribution, updated: &Distribution) -> PatchIdentity {
        let spec = self.spec;
        let applies_to_version = spec
            .applies_to_version()
            .unwrap_or(base.version())
            .to_string();

        let mut identity = PatchIdentity {
            name: base.name().to_string(),
            applies_to_version,
            patch_type: spec.patch_type(),
            resulting_version: match spec.patch_type() {
                PatchType::Cumulative => Some(
                    spec.resulting_version()
                        .unwrap_or(updated.version())
                        .to_string(),
                ),
                PatchType::OneOff => None,
            },
        };

        if let Some(rename) = spec.rename() {
            match spec.patch_type() {
                PatchType::Cumulative => {
                    info!(
                        "Presenting patch as {} {} -> {}",
                        rename.name, rename.applies_to_version, rename.resulting_version
                    );
                    identity.name = rename.name.clone();
                    identity.applies_to_version = rename.applies_to_version.clone();
                    identity.resulting_version = Some(rename.resulting_version.clone());
                }
                PatchType::OneOff => {
                    warn!("Rename only applies to cumulative patches, ignoring it for one-off patch");
                }
            }
        }

        identity
    }
}
