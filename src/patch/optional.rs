// src/patch/optional.rs

//! Optional path resolution
//!
//! Optional paths are misc subtrees that may legitimately be missing from an
//! installation (documentation, app client, ...). They are resolved in the
//! order they were declared, so a path can only depend on one declared before
//! it.

use crate::content::{ContentModification, OptionalCondition};
use crate::error::{Error, Result};
use crate::spec::OptionalPathSpec;
use tracing::debug;

#[derive(Debug, Clone)]
struct ResolvedPath {
    spec: OptionalPathSpec,
    eligible: bool,
}

/// Resolved state of every declared optional path
#[derive(Debug, Clone, Default)]
pub struct OptionalPathResolver {
    resolved: Vec<ResolvedPath>,
}

impl OptionalPathResolver {
    /// Resolve `paths` in order
    ///
    /// `is_present` reports whether a path exists in either distribution. A
    /// path is eligible when it is present and its `requires` (if any) names an
    /// earlier path that is itself eligible.
    pub fn resolve(
        paths: &[OptionalPathSpec],
        is_present: impl Fn(&str) -> bool,
    ) -> Result<Self> {
        let mut resolved: Vec<ResolvedPath> = Vec::with_capacity(paths.len());

        for spec in paths {
            let dependency_ok = match &spec.requires {
                None => true,
                Some(required) => resolved
                    .iter()
                    .find(|r| &r.spec.path == required)
                    .map(|r| r.eligible)
                    .ok_or_else(|| {
                        Error::ConfigurationError(format!(
                            "optional path '{}' requires '{}', which is not declared before it",
                            spec.path, required
                        ))
                    })?,
            };

            let eligible = dependency_ok && is_present(&spec.path);
            debug!("Optional path {} eligible: {}", spec.path, eligible);
            resolved.push(ResolvedPath {
                spec: spec.clone(),
                eligible,
            });
        }

        Ok(Self { resolved })
    }

    /// Resolved eligibility of a declared path
    pub fn is_eligible(&self, path: &str) -> Option<bool> {
        self.resolved
            .iter()
            .find(|r| r.spec.path == path)
            .map(|r| r.eligible)
    }

    /// Most specific declared path containing `file`
    fn owner_of(&self, file: &str) -> Option<&ResolvedPath> {
        self.resolved
            .iter()
            .filter(|r| file == r.spec.path || file.starts_with(&format!("{}/", r.spec.path)))
            .max_by_key(|r| r.spec.path.len())
    }

    /// Drop misc modifications under ineligible paths and tag the rest
    pub fn apply(&self, misc: Vec<ContentModification>) -> Vec<ContentModification> {
        if self.resolved.is_empty() {
            return misc;
        }

        misc.into_iter()
            .filter_map(|mut modification| {
                let Some(file) = modification.item.relative_file() else {
                    return Some(modification);
                };
                match self.owner_of(&file) {
                    None => Some(modification),
                    Some(owner) if owner.eligible => {
                        modification.optional = Some(OptionalCondition {
                            path: owner.spec.path.clone(),
                            requires: owner.spec.requires.clone(),
                        });
                        Some(modification)
                    }
                    Some(owner) => {
                        debug!("Dropping {} under ineligible optional path {}", file, owner.spec.path);
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentItem;

    fn spec(path: &str, requires: Option<&str>) -> OptionalPathSpec {
        OptionalPathSpec::new(path, requires.map(str::to_string))
    }

    #[test]
    fn test_requires_observes_earlier_state() {
        let paths = vec![spec("docs", None), spec("docs/examples", Some("docs"))];

        let resolver = OptionalPathResolver::resolve(&paths, |_| true).unwrap();
        assert_eq!(resolver.is_eligible("docs/examples"), Some(true));

        // docs absent: the dependent path is ineligible even though present
        let resolver = OptionalPathResolver::resolve(&paths, |p| p != "docs").unwrap();
        assert_eq!(resolver.is_eligible("docs"), Some(false));
        assert_eq!(resolver.is_eligible("docs/examples"), Some(false));
    }

    #[test]
    fn test_forward_requires_rejected() {
        let paths = vec![spec("docs/examples", Some("docs")), spec("docs", None)];
        let err = OptionalPathResolver::resolve(&paths, |_| true).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_apply_marks_and_drops() {
        let paths = vec![spec("docs", None), spec("appclient", None)];
        let resolver = OptionalPathResolver::resolve(&paths, |p| p == "docs").unwrap();

        let misc = vec![
            ContentModification::added(ContentItem::misc("appclient/run.sh"), "1"),
            ContentModification::added(ContentItem::misc("bin/run.sh"), "2"),
            ContentModification::added(ContentItem::misc("docs/index.html"), "3"),
        ];
        let result = resolver.apply(misc);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].item, ContentItem::misc("bin/run.sh"));
        assert!(result[0].optional.is_none());
        assert_eq!(
            result[1].optional,
            Some(OptionalCondition {
                path: "docs".to_string(),
                requires: None
            })
        );
    }

    #[test]
    fn test_most_specific_path_wins() {
        let paths = vec![spec("docs", None), spec("docs/examples", Some("docs"))];
        let resolver = OptionalPathResolver::resolve(&paths, |_| true).unwrap();
        let result = resolver.apply(vec![ContentModification::added(
            ContentItem::misc("docs/examples/a.xml"),
            "1",
        )]);
        let optional = result[0].optional.as_ref().unwrap();
        assert_eq!(optional.path, "docs/examples");
        assert_eq!(optional.requires.as_deref(), Some("docs"));
    }
}
