// src/spec/document.rs

//! Patch config document (patch-config.toml)
//!
//! The document is a thin serde layer: [`PatchConfigDocument::into_spec`]
//! replays it as the builder call sequence, so every structural rule lives in
//! the builder and not here.

use super::{PatchSpec, PatchSpecBuilder, PatchType};
use crate::content::ContentItem;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root structure of patch-config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatchConfigDocument {
    pub patch: PatchSection,

    #[serde(default, rename = "element", skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<ElementSection>,

    #[serde(default, rename = "optional-path", skip_serializing_if = "Vec::is_empty")]
    pub optional_paths: Vec<OptionalPathSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<RenameSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatchSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Expected product name of the applies-to distribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to_name: Option<String>,

    #[serde(default = "default_true")]
    pub generate_by_diff: bool,

    /// Misc paths flagged as in runtime use
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_runtime_use: Vec<String>,

    /// Misc paths included when generate-by-diff is off
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specified_content: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_off: Option<OneOffSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative: Option<CumulativeSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OneOffSection {
    pub applies_to_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CumulativeSection {
    #[serde(default)]
    pub applies_to_version: String,
    #[serde(default)]
    pub resulting_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ElementSection {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,

    #[serde(default = "default_true")]
    pub generate_by_diff: bool,

    /// `name[:slot]` module references included when generate-by-diff is off
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specified_modules: Vec<String>,

    /// `name[:slot]` bundle references included when generate-by-diff is off
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specified_bundles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OptionalPathSection {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenameSection {
    pub name: String,
    pub applies_to_version: String,
    pub resulting_version: String,
}

fn default_true() -> bool {
    true
}

impl PatchConfigDocument {
    /// Load a document from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&content)
    }

    /// Parse a document from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let document: PatchConfigDocument = toml::from_str(content)?;
        Ok(document)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ParseError(e.to_string()))
    }

    /// Replay the document against a fresh builder
    pub fn into_builder(self) -> Result<PatchSpecBuilder> {
        let mut builder = PatchSpecBuilder::new();
        let patch = self.patch;

        if let Some(id) = patch.id {
            builder.set_patch_id(id)?;
        }
        if let Some(description) = patch.description {
            builder.set_description(description);
        }
        if let Some(name) = patch.applies_to_name {
            builder.set_applies_to_name(name);
        }

        match (patch.one_off, patch.cumulative) {
            (Some(_), Some(_)) => {
                return Err(Error::ConfigurationError(
                    "patch can be either one-off or cumulative, not both".to_string(),
                ));
            }
            (Some(one_off), None) => {
                builder.set_one_off_type(one_off.applies_to_version)?;
            }
            (None, Some(cp)) => {
                builder.set_cumulative_type(cp.applies_to_version, cp.resulting_version)?;
            }
            (None, None) => {}
        }

        builder.set_generate_by_diff(patch.generate_by_diff);
        for item in patch.in_runtime_use {
            builder.add_runtime_use_item(item);
        }
        for path in patch.specified_content {
            builder.add_specified_content(ContentItem::misc(&path));
        }

        for element in self.elements {
            let patch_type = element
                .patch_type
                .as_deref()
                .map(str::parse::<PatchType>)
                .transpose()?;

            let eb = builder.add_element(element.name)?;
            if let Some(id) = element.id {
                eb.set_id(id);
            }
            if let Some(description) = element.description {
                eb.set_description(description);
            }
            if let Some(patch_type) = patch_type {
                eb.set_patch_type(patch_type);
            }
            eb.set_generate_by_diff(element.generate_by_diff);
            for module in &element.specified_modules {
                eb.add_specified_content(ContentItem::parse_module_ref(module));
            }
            for bundle in &element.specified_bundles {
                eb.add_specified_content(ContentItem::parse_bundle_ref(bundle));
            }
        }

        for op in self.optional_paths {
            builder.add_optional_path(op.path, op.requires);
        }

        if let Some(rename) = self.rename {
            builder.set_rename(rename.name, rename.applies_to_version, rename.resulting_version);
        }

        Ok(builder)
    }

    pub fn into_spec(self) -> Result<PatchSpec> {
        self.into_builder()?.build()
    }

    /// Starter document for `patchgen template`
    pub fn template(id: &str, patch_type: PatchType, from: &str, to: Option<&str>, layers: &[String]) -> Self {
        let (one_off, cumulative) = match patch_type {
            PatchType::OneOff => (
                Some(OneOffSection {
                    applies_to_version: from.to_string(),
                }),
                None,
            ),
            PatchType::Cumulative => (
                None,
                Some(CumulativeSection {
                    applies_to_version: from.to_string(),
                    resulting_version: to.unwrap_or_default().to_string(),
                }),
            ),
        };

        PatchConfigDocument {
            patch: PatchSection {
                id: Some(id.to_string()),
                description: Some(format!("Patch {}", id)),
                applies_to_name: None,
                generate_by_diff: true,
                in_runtime_use: Vec::new(),
                specified_content: Vec::new(),
                one_off,
                cumulative,
            },
            elements: layers
                .iter()
                .map(|name| ElementSection {
                    name: name.clone(),
                    id: Some(format!("{}-{}", name, id)),
                    description: None,
                    patch_type: None,
                    generate_by_diff: true,
                    specified_modules: Vec::new(),
                    specified_bundles: Vec::new(),
                })
                .collect(),
            optional_paths: Vec::new(),
            rename: None,
        }
    }
}

/// Load and build a [`PatchSpec`] from a patch-config.toml file
pub fn load_spec(path: &Path) -> Result<PatchSpec> {
    PatchConfigDocument::from_file(path)?.into_spec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ContentFilter;

    #[test]
    fn test_minimal_document() {
        let toml = r#"
[patch]
id = "cp-1"

[patch.one-off]
applies-to-version = "7.0.0"
"#;
        let spec = PatchConfigDocument::parse(toml).unwrap().into_spec().unwrap();
        assert_eq!(spec.id(), "cp-1");
        assert_eq!(spec.patch_type(), PatchType::OneOff);
        assert_eq!(spec.applies_to_version(), Some("7.0.0"));
        assert!(spec.generate_by_diff());
    }

    #[test]
    fn test_full_document() {
        let toml = r#"
[patch]
id = "cp-2"
description = "Second CP"
applies-to-name = "WildFly"
generate-by-diff = false
in-runtime-use = ["bin/standalone.sh"]
specified-content = ["bin/standalone.conf"]

[patch.cumulative]
applies-to-version = "7.0.0"
resulting-version = "7.1.0"

[[element]]
name = "base"
id = "base-cp-2"
description = "base layer"

[[element]]
name = "fix"
type = "one-off"
generate-by-diff = false
specified-modules = ["org.fix", "org.fix.extra:1.0"]

[[optional-path]]
path = "docs"

[[optional-path]]
path = "docs/examples"
requires = "docs"

[rename]
name = "EAP"
applies-to-version = "7.0"
resulting-version = "7.1"
"#;
        let spec = PatchConfigDocument::parse(toml).unwrap().into_spec().unwrap();
        assert_eq!(spec.description(), "Second CP");
        assert_eq!(spec.applies_to_name(), Some("WildFly"));
        assert_eq!(spec.resulting_version(), Some("7.1.0"));
        assert!(!spec.generate_by_diff());
        assert!(spec.runtime_use_items().contains("bin/standalone.sh"));
        assert!(spec.content_policy().accepts(&ContentItem::misc("bin/standalone.conf")));

        assert_eq!(spec.elements().len(), 2);
        assert_eq!(spec.element("base").unwrap().id(), "base-cp-2");
        let fix = spec.element("fix").unwrap();
        assert_eq!(fix.patch_type(), Some(PatchType::OneOff));
        assert!(fix.filter().accepts(&ContentItem::module("org.fix", "main")));
        assert!(fix.filter().accepts(&ContentItem::module("org.fix.extra", "1.0")));
        assert!(!fix.filter().accepts(&ContentItem::module("org.other", "main")));

        assert_eq!(spec.optional_paths().len(), 2);
        assert_eq!(spec.rename().unwrap().name, "EAP");
    }

    #[test]
    fn test_duplicate_element_in_document() {
        let toml = r#"
[patch.one-off]
applies-to-version = "1"

[[element]]
name = "base"

[[element]]
name = "base"
"#;
        let err = PatchConfigDocument::parse(toml).unwrap().into_spec().unwrap_err();
        assert!(matches!(err, Error::DuplicateElementError(_)));
    }

    #[test]
    fn test_both_types_rejected() {
        let toml = r#"
[patch.one-off]
applies-to-version = "1"

[patch.cumulative]
applies-to-version = "1"
resulting-version = "2"
"#;
        let err = PatchConfigDocument::parse(toml).unwrap().into_spec().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_invalid_toml() {
        let err = PatchConfigDocument::parse("[patch\nid=").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn test_template_round_trip() {
        let layers = vec!["base".to_string(), "myproduct".to_string()];
        let doc = PatchConfigDocument::template("cp-3", PatchType::Cumulative, "1.0", Some("1.1"), &layers);
        let toml = doc.to_toml().unwrap();

        let spec = PatchConfigDocument::parse(&toml).unwrap().into_spec().unwrap();
        assert_eq!(spec.id(), "cp-3");
        assert_eq!(spec.patch_type(), PatchType::Cumulative);
        assert_eq!(spec.element("myproduct").unwrap().id(), "myproduct-cp-3");
    }
}
