// tests/common/mod.rs

//! Shared fixtures for integration tests: small distribution trees, patch
//! configs and archive inspection.

#![allow(dead_code)]

use patchgen::{GenerationRequest, PatchMetadata};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PRODUCT: &str = "WildFly";

/// Write `content` at `rel` under `root`, creating parents
pub fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Create a distribution root reporting `name` and `version`
pub fn write_dist(root: &Path, name: &str, version: &str) {
    write_file(
        root,
        "modules/system/layers/base/org/jboss/as/product/main/module.xml",
        "<module name=\"org.jboss.as.product\"/>",
    );
    write_file(
        root,
        "modules/system/layers/base/org/jboss/as/product/main/product.properties",
        &format!("name={}\nversion={}\n", name, version),
    );
}

fn module_dir(module: &str) -> String {
    format!("{}/main", module.replace('.', "/"))
}

/// Write a layer module with one jar carrying `jar`
pub fn write_module(root: &Path, layer: &str, module: &str, jar: &str) {
    let dir = format!("modules/system/layers/{}/{}", layer, module_dir(module));
    write_file(root, &format!("{}/module.xml", dir), &format!("<module name=\"{}\"/>", module));
    write_file(root, &format!("{}/{}.jar", dir, module), jar);
}

/// Write an add-on module with one jar carrying `jar`
pub fn write_add_on_module(root: &Path, add_on: &str, module: &str, jar: &str) {
    let dir = format!("modules/system/add-ons/{}/{}", add_on, module_dir(module));
    write_file(root, &format!("{}/module.xml", dir), &format!("<module name=\"{}\"/>", module));
    write_file(root, &format!("{}/{}.jar", dir, module), jar);
}

/// Temp area holding two distributions, a work dir and an output dir
pub struct Fixture {
    pub temp: TempDir,
    pub base: PathBuf,
    pub updated: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn empty() -> Self {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let updated = temp.path().join("updated");
        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        Self {
            temp,
            base,
            updated,
            work,
        }
    }

    /// 1.0 -> 1.1 with misc, layer, and add-on changes
    ///
    /// - misc: `bin/standalone.sh` modified, `bin/new.sh` added, `README.txt` unchanged
    /// - base: `org.jboss.as.server` modified, `org.jboss.as.removed` removed,
    ///   `org.jboss.as.added` added
    /// - layer `extra`: `org.extra` modified
    /// - add-on `addon1`: unchanged
    pub fn standard() -> Self {
        let fixture = Self::empty();
        let (base, updated) = (&fixture.base, &fixture.updated);

        write_dist(base, PRODUCT, "1.0");
        write_file(base, "bin/standalone.sh", "#!/bin/sh\necho 1.0\n");
        write_file(base, "README.txt", "readme\n");
        write_file(base, "docs/index.html", "<html/>");
        write_module(base, "base", "org.jboss.as.server", "server-1.0");
        write_module(base, "base", "org.jboss.as.removed", "removed");
        write_module(base, "extra", "org.extra", "extra-1.0");
        write_add_on_module(base, "addon1", "org.addon", "addon");

        write_dist(updated, PRODUCT, "1.1");
        write_file(updated, "bin/standalone.sh", "#!/bin/sh\necho 1.1\n");
        write_file(updated, "bin/new.sh", "new\n");
        write_file(updated, "README.txt", "readme\n");
        write_file(updated, "docs/index.html", "<html/>");
        write_module(updated, "base", "org.jboss.as.server", "server-1.1");
        write_module(updated, "base", "org.jboss.as.added", "added");
        write_module(updated, "extra", "org.extra", "extra-1.1");
        write_add_on_module(updated, "addon1", "org.addon", "addon");

        fixture
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write a patch config next to the distributions
    pub fn config(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    /// Request for base -> updated with everything else defaulted
    pub fn request(&self, config: &Path, output: &Path) -> GenerationRequest {
        GenerationRequest {
            applies_to_dist: Some(self.base.clone()),
            updated_dist: Some(self.updated.clone()),
            patch_config: Some(config.to_path_buf()),
            output_file: Some(output.to_path_buf()),
            work_dir: Some(self.work.clone()),
            ..GenerationRequest::default()
        }
    }

    /// Whether the scratch area is empty again
    pub fn work_is_empty(&self) -> bool {
        fs::read_dir(&self.work).unwrap().next().is_none()
    }
}

/// Cumulative patch config with fixed ids for the given layers
pub fn cumulative_config(id: &str, from: &str, to: &str, layers: &[&str]) -> String {
    let mut config = format!(
        "[patch]\nid = \"{id}\"\ndescription = \"test patch\"\n\n[patch.cumulative]\napplies-to-version = \"{from}\"\nresulting-version = \"{to}\"\n"
    );
    for layer in layers {
        config.push_str(&format!(
            "\n[[element]]\nname = \"{layer}\"\nid = \"{layer}-{id}\"\n"
        ));
    }
    config
}

/// One-off patch config with fixed ids for the given layers
pub fn one_off_config(id: &str, version: &str, layers: &[&str]) -> String {
    let mut config = format!(
        "[patch]\nid = \"{id}\"\n\n[patch.one-off]\napplies-to-version = \"{version}\"\n"
    );
    for layer in layers {
        config.push_str(&format!(
            "\n[[element]]\nname = \"{layer}\"\nid = \"{layer}-{id}\"\n"
        ));
    }
    config
}

/// Unpack an archive into a fresh temp dir
pub fn unpack(archive: &Path) -> TempDir {
    let target = TempDir::new().unwrap();
    patchgen::archive::unpack(archive, target.path()).unwrap();
    target
}

/// Metadata stored in an archive
pub fn archive_metadata(archive: &Path) -> PatchMetadata {
    let unpacked = unpack(archive);
    PatchMetadata::read_from(unpacked.path()).unwrap()
}

/// Relative misc paths with their modification kind, in metadata order
pub fn misc_summary(metadata: &PatchMetadata) -> Vec<(String, patchgen::ModificationType)> {
    metadata
        .misc
        .iter()
        .map(|m| (m.item.relative_file().unwrap(), m.kind))
        .collect()
}
