// src/distribution/compare.rs

//! Digest-based comparison of two loaded distributions

use super::{ComparisonScope, Distribution, LayerContent, LayerKind};
use crate::content::{ContentItem, ContentModification};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Changes found in one layer or add-on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDiff {
    pub name: String,
    pub kind: LayerKind,
    /// Modules first, then bundles, each sorted by (name, slot)
    pub modifications: Vec<ContentModification>,
}

/// Everything that differs between an applies-to and an updated distribution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionDiff {
    /// Misc files sorted by relative path
    pub misc: Vec<ContentModification>,
    /// Every visited layer (sorted), then every visited add-on (sorted)
    pub layers: Vec<LayerDiff>,
}

impl DistributionDiff {
    pub fn is_empty(&self) -> bool {
        self.misc.is_empty() && self.layers.iter().all(|l| l.modifications.is_empty())
    }

    pub fn modification_count(&self) -> usize {
        self.misc.len()
            + self
                .layers
                .iter()
                .map(|l| l.modifications.len())
                .sum::<usize>()
    }
}

/// Compare two distributions
///
/// Layers present in either tree are visited, including ones that exist on
/// only one side, as long as the scope includes them.
pub fn compare(
    base: &Distribution,
    updated: &Distribution,
    scope: &ComparisonScope,
) -> DistributionDiff {
    let misc = diff_entries(&base.misc, &updated.misc, |path| ContentItem::misc(path));

    let mut layers = Vec::new();
    for kind in [LayerKind::Layer, LayerKind::AddOn] {
        let (old, new) = match kind {
            LayerKind::Layer => (&base.layers, &updated.layers),
            LayerKind::AddOn => (&base.add_ons, &updated.add_ons),
        };
        let names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        for name in names {
            if !scope.layers.includes(name) {
                continue;
            }
            let empty = LayerContent::default();
            let old_content = old.get(name).unwrap_or(&empty);
            let new_content = new.get(name).unwrap_or(&empty);

            let mut modifications =
                diff_entries(&old_content.modules, &new_content.modules, ContentItem::clone);
            modifications.extend(diff_entries(
                &old_content.bundles,
                &new_content.bundles,
                ContentItem::clone,
            ));

            debug!("{} {}: {} changes", kind, name, modifications.len());
            layers.push(LayerDiff {
                name: name.clone(),
                kind,
                modifications,
            });
        }
    }

    DistributionDiff { misc, layers }
}

/// Walk both sorted maps once, emitting add/modify/remove in key order
fn diff_entries<K: Ord>(
    old: &BTreeMap<K, String>,
    new: &BTreeMap<K, String>,
    to_item: impl Fn(&K) -> ContentItem,
) -> Vec<ContentModification> {
    let keys: BTreeSet<&K> = old.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter_map(|key| match (old.get(key), new.get(key)) {
            (None, Some(hash)) => Some(ContentModification::added(to_item(key), hash.clone())),
            (Some(hash), None) => Some(ContentModification::removed(to_item(key), hash.clone())),
            (Some(before), Some(after)) if before != after => Some(
                ContentModification::modified(to_item(key), before.clone(), after.clone()),
            ),
            _ => None,
        })
        .collect()
}
