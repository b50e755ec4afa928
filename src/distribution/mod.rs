// src/distribution/mod.rs

//! Modular server distributions
//!
//! A distribution root is laid out as:
//!
//! ```text
//! modules/system/layers/<layer>/<module path>/<slot>/module.xml
//! modules/system/add-ons/<add-on>/<module path>/<slot>/module.xml
//! bundles/system/layers/<layer>/<bundle path>/<slot>/...
//! everything else                                  -> misc files
//! ```
//!
//! Loading walks the tree once and records a digest per misc file, per module
//! and per bundle. The product identity is read from the `product.properties`
//! of the `org.jboss.as.product` module in the base layer.

mod compare;

pub use compare::{compare, DistributionDiff, LayerDiff};

use crate::content::ContentItem;
use crate::error::{Error, IoResultExt, Result};
use crate::hash;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Root of layered modules
pub const MODULE_LAYERS_DIR: &str = "modules/system/layers";
/// Root of add-on modules
pub const MODULE_ADD_ONS_DIR: &str = "modules/system/add-ons";
/// Root of layered bundles
pub const BUNDLE_LAYERS_DIR: &str = "bundles/system/layers";
/// File marking a module directory
pub const MODULE_DESCRIPTOR: &str = "module.xml";
/// Where the product name and version are read from
pub const PRODUCT_DESCRIPTOR: &str =
    "modules/system/layers/base/org/jboss/as/product/main/product.properties";
/// Module paths carrying version identity, skipped unless versions are included
pub const VERSION_MODULE_PATHS: &[&str] = &["org/jboss/as/product", "org/jboss/as/version"];

/// Name and version a distribution reports about itself
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductIdentity {
    pub name: String,
    pub version: String,
}

impl ProductIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Read the identity of the distribution at `root`
    pub fn read(root: &Path) -> Result<Self> {
        let path = root.join(PRODUCT_DESCRIPTOR);
        let content = std::fs::read_to_string(&path).at_path(&path)?;
        Self::parse(&content).map_err(|e| match e {
            Error::ParseError(msg) => Error::ParseError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse `key=value` properties content
    pub fn parse(content: &str) -> Result<Self> {
        let mut name = None;
        let mut version = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once(['=', ':']) else {
                continue;
            };
            match key.trim() {
                "name" => name = Some(value.trim().to_string()),
                "version" => version = Some(value.trim().to_string()),
                _ => {}
            }
        }

        match (name, version) {
            (Some(name), Some(version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self { name, version })
            }
            _ => Err(Error::ParseError(
                "product descriptor must define non-empty 'name' and 'version'".to_string(),
            )),
        }
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Whether a modular subdivision is a layer or an add-on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Layer,
    AddOn,
}

impl LayerKind {
    /// Module root of a named layer/add-on, relative to the distribution root
    pub fn modules_dir(&self, name: &str) -> String {
        match self {
            Self::Layer => format!("{}/{}", MODULE_LAYERS_DIR, name),
            Self::AddOn => format!("{}/{}", MODULE_ADD_ONS_DIR, name),
        }
    }

    /// Bundle root of a named layer; add-ons carry no bundles
    pub fn bundles_dir(&self, name: &str) -> Option<String> {
        match self {
            Self::Layer => Some(format!("{}/{}", BUNDLE_LAYERS_DIR, name)),
            Self::AddOn => None,
        }
    }

    pub fn is_add_on(&self) -> bool {
        matches!(self, Self::AddOn)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layer => f.write_str("layer"),
            Self::AddOn => f.write_str("add-on"),
        }
    }
}

/// How closely files are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InspectionDepth {
    /// Raw byte digests
    #[default]
    Shallow,
    /// Text resources are normalised before hashing
    Detailed,
}

/// Which layers/add-ons get visited
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayerScope {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl LayerScope {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }
}

/// Everything that shapes a comparison, passed explicitly to the loader
#[derive(Debug, Clone, Default)]
pub struct ComparisonScope {
    /// Module path prefixes (`org/jboss/as/version`) left out of the comparison
    pub excluded_modules: Vec<String>,
    pub depth: InspectionDepth,
    pub layers: LayerScope,
}

impl ComparisonScope {
    /// Scope for a run; version-bearing modules are excluded unless `include_version`
    pub fn new(include_version: bool, depth: InspectionDepth) -> Self {
        let excluded_modules = if include_version {
            Vec::new()
        } else {
            VERSION_MODULE_PATHS.iter().map(|p| p.to_string()).collect()
        };
        Self {
            excluded_modules,
            depth,
            layers: LayerScope::All,
        }
    }

    fn is_excluded(&self, module_dir: &str) -> bool {
        self.excluded_modules
            .iter()
            .any(|prefix| module_dir == prefix || module_dir.starts_with(&format!("{}/", prefix)))
    }

    fn digest(&self, path: &Path) -> std::io::Result<String> {
        match self.depth {
            InspectionDepth::Shallow => hash::sha256_file(path),
            InspectionDepth::Detailed => hash::normalized_digest(path),
        }
    }
}

/// Modules and bundles of one layer/add-on, keyed by identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerContent {
    pub modules: BTreeMap<ContentItem, String>,
    pub bundles: BTreeMap<ContentItem, String>,
}

/// A loaded distribution
#[derive(Debug, Clone)]
pub struct Distribution {
    pub root: PathBuf,
    pub identity: ProductIdentity,
    /// Relative file path -> digest
    pub misc: BTreeMap<String, String>,
    pub layers: BTreeMap<String, LayerContent>,
    pub add_ons: BTreeMap<String, LayerContent>,
}

impl Distribution {
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn version(&self) -> &str {
        &self.identity.version
    }

    /// Whether a misc file equals `path` or lies under it
    pub fn has_path(&self, path: &str) -> bool {
        let prefix = format!("{}/", path);
        self.misc
            .keys()
            .any(|file| file == path || file.starts_with(&prefix))
    }

    /// Whether a layer or add-on with this name exists
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name) || self.add_ons.contains_key(name)
    }

    pub fn layer(&self, kind: LayerKind, name: &str) -> Option<&LayerContent> {
        match kind {
            LayerKind::Layer => self.layers.get(name),
            LayerKind::AddOn => self.add_ons.get(name),
        }
    }
}

/// Loads a distribution tree; the seam the generator compares through
pub trait DistributionLoader {
    fn load(&self, root: &Path, scope: &ComparisonScope) -> Result<Distribution>;
}

/// Loader reading a distribution from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDistributionLoader;

impl FsDistributionLoader {
    pub fn new() -> Self {
        Self
    }
}

/// Where a file sits inside a distribution
enum Placement<'a> {
    Misc,
    Module {
        kind: LayerKind,
        layer: &'a str,
        rest: &'a str,
    },
    Bundle {
        layer: &'a str,
        rest: &'a str,
    },
}

fn place(relative: &str) -> Placement<'_> {
    let split = |prefix: &str| -> Option<(&str, &str)> {
        relative
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('/'))
            .and_then(|r| r.split_once('/'))
    };

    if let Some((layer, rest)) = split(MODULE_LAYERS_DIR) {
        Placement::Module {
            kind: LayerKind::Layer,
            layer,
            rest,
        }
    } else if let Some((layer, rest)) = split(MODULE_ADD_ONS_DIR) {
        Placement::Module {
            kind: LayerKind::AddOn,
            layer,
            rest,
        }
    } else if let Some((layer, rest)) = split(BUNDLE_LAYERS_DIR) {
        Placement::Bundle { layer, rest }
    } else {
        Placement::Misc
    }
}

/// Files of one layer, relative to its module (or bundle) root
#[derive(Default)]
struct LayerFiles {
    module_files: Vec<(String, PathBuf)>,
    bundle_files: Vec<(String, PathBuf)>,
}

impl DistributionLoader for FsDistributionLoader {
    fn load(&self, root: &Path, scope: &ComparisonScope) -> Result<Distribution> {
        if !root.is_dir() {
            return Err(Error::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "distribution root is not a directory"),
            ));
        }

        let identity = ProductIdentity::read(root)?;
        info!("Loading {} from {}", identity, root.display());

        let mut misc = BTreeMap::new();
        let mut grouped: BTreeMap<(LayerKind, String), LayerFiles> = BTreeMap::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = relative_path(root, entry.path());
            match place(&relative) {
                Placement::Misc => {
                    let digest = scope.digest(entry.path()).at_path(entry.path())?;
                    misc.insert(relative, digest);
                }
                Placement::Module { kind, layer, rest } => {
                    if scope.layers.includes(layer) {
                        grouped
                            .entry((kind, layer.to_string()))
                            .or_default()
                            .module_files
                            .push((rest.to_string(), entry.path().to_path_buf()));
                    }
                }
                Placement::Bundle { layer, rest } => {
                    if scope.layers.includes(layer) {
                        grouped
                            .entry((LayerKind::Layer, layer.to_string()))
                            .or_default()
                            .bundle_files
                            .push((rest.to_string(), entry.path().to_path_buf()));
                    }
                }
            }
        }

        let mut layers = BTreeMap::new();
        let mut add_ons = BTreeMap::new();
        for ((kind, name), files) in grouped {
            let content = LayerContent {
                modules: digest_modules(&files.module_files, scope)?,
                bundles: digest_bundles(&files.bundle_files, scope)?,
            };
            debug!(
                "{} {}: {} modules, {} bundles",
                kind,
                name,
                content.modules.len(),
                content.bundles.len()
            );
            match kind {
                LayerKind::Layer => layers.insert(name, content),
                LayerKind::AddOn => add_ons.insert(name, content),
            };
        }

        Ok(Distribution {
            root: root.to_path_buf(),
            identity,
            misc,
            layers,
            add_ons,
        })
    }
}

/// `/`-separated path of `path` relative to `root`
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Identity of a module/bundle directory: dotted parent path plus slot
fn slot_identity(dir: &str) -> (String, String) {
    match dir.rsplit_once('/') {
        Some((name, slot)) => (name.replace('/', "."), slot.to_string()),
        None => (dir.to_string(), "main".to_string()),
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Group files under the nearest directory holding a module.xml
fn digest_modules(
    files: &[(String, PathBuf)],
    scope: &ComparisonScope,
) -> Result<BTreeMap<ContentItem, String>> {
    let module_dirs: BTreeSet<&str> = files
        .iter()
        .filter(|(rel, _)| rel == MODULE_DESCRIPTOR || rel.ends_with(&format!("/{}", MODULE_DESCRIPTOR)))
        .map(|(rel, _)| parent_dir(rel))
        .filter(|dir| !dir.is_empty() && !scope.is_excluded(dir))
        .collect();

    let mut members: BTreeMap<&str, Vec<(String, String)>> = BTreeMap::new();
    for (rel, path) in files {
        // Longest enclosing module directory wins
        let owner = module_dirs
            .iter()
            .filter(|dir| rel.starts_with(&format!("{}/", dir)))
            .max_by_key(|dir| dir.len());
        let Some(&owner) = owner else {
            continue;
        };
        let inner = rel[owner.len() + 1..].to_string();
        let digest = scope.digest(path).at_path(path)?;
        members.entry(owner).or_default().push((inner, digest));
    }

    Ok(members
        .into_iter()
        .map(|(dir, entries)| {
            let (name, slot) = slot_identity(dir);
            let digest = hash::combine(entries.iter().map(|(n, d)| (n.as_str(), d.as_str())));
            (ContentItem::module(name, slot), digest)
        })
        .collect())
}

/// Group files under the outermost directory that directly holds files
///
/// Nested directories (a bundle's `lib/`, say) belong to that bundle rather
/// than forming bundles of their own.
fn digest_bundles(
    files: &[(String, PathBuf)],
    scope: &ComparisonScope,
) -> Result<BTreeMap<ContentItem, String>> {
    let holding_dirs: BTreeSet<&str> = files
        .iter()
        .map(|(rel, _)| parent_dir(rel))
        .filter(|dir| !dir.is_empty() && !scope.is_excluded(dir))
        .collect();

    let mut members: BTreeMap<&str, Vec<(String, String)>> = BTreeMap::new();
    for (rel, path) in files {
        let owner = holding_dirs
            .iter()
            .filter(|dir| rel.starts_with(&format!("{}/", dir)))
            .min_by_key(|dir| dir.len());
        let Some(&owner) = owner else {
            continue;
        };
        let digest = scope.digest(path).at_path(path)?;
        members
            .entry(owner)
            .or_default()
            .push((rel[owner.len() + 1..].to_string(), digest));
    }

    Ok(members
        .into_iter()
        .map(|(dir, entries)| {
            let (name, slot) = slot_identity(dir);
            let digest = hash::combine(entries.iter().map(|(n, d)| (n.as_str(), d.as_str())));
            (ContentItem::bundle(name, slot), digest)
        })
        .collect())
}
