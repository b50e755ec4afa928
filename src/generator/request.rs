// src/generator/request.rs

//! Inputs of a generation run and their validation

use crate::distribution::InspectionDepth;
use crate::error::{Error, Result};
use crate::spec::MiscFileAllowlist;
use std::path::{Path, PathBuf};

/// Raw inputs as collected from the command line
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub applies_to_dist: Option<PathBuf>,
    pub updated_dist: Option<PathBuf>,
    pub patch_config: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub combine_with: Option<PathBuf>,
    pub include_version: bool,
    pub detailed_inspection: bool,
    pub skip_layers_without_config: bool,
    pub skip_misc_files: bool,
    pub included_misc_files: Vec<String>,
    pub strict_layers: bool,
    pub work_dir: Option<PathBuf>,
}

/// Run options that shape comparison and assembly
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Compare version-bearing modules even for one-off patches
    pub include_version: bool,
    pub depth: InspectionDepth,
    /// Do not visit layers the patch config does not mention
    pub skip_layers_without_config: bool,
    pub misc_allowlist: Option<MiscFileAllowlist>,
    pub strict_layers: bool,
    /// Where scratch workspaces are created
    pub work_dir: PathBuf,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            include_version: false,
            depth: InspectionDepth::Shallow,
            skip_layers_without_config: false,
            misc_allowlist: None,
            strict_layers: false,
            work_dir: std::env::temp_dir(),
        }
    }
}

/// A request whose inputs are all present and plausible
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub applies_to_dist: PathBuf,
    pub updated_dist: PathBuf,
    pub patch_config: PathBuf,
    pub output_file: PathBuf,
    pub combine_with: Option<PathBuf>,
    pub options: GenerationOptions,
}

impl GenerationRequest {
    /// Check the request, reporting every problem at once
    ///
    /// Conflicting flags, missing inputs (listed sorted) and supplied paths
    /// that do not exist or have the wrong kind all end up in a single
    /// configuration error.
    pub fn validate(self) -> Result<ValidatedRequest> {
        let mut problems = Vec::new();
        if !self.skip_misc_files && !self.included_misc_files.is_empty() {
            problems.push(
                "--included-misc-files can only be used together with --skip-misc-files".to_string(),
            );
        }

        // Without an updated root there is nowhere to put the default output
        let output_file = self
            .output_file
            .clone()
            .or_else(|| self.updated_dist.as_deref().map(default_output));

        let mut missing = Vec::new();
        if self.applies_to_dist.is_none() {
            missing.push("--applies-to-dist");
        }
        if self.updated_dist.is_none() {
            missing.push("--updated-dist");
        }
        if self.patch_config.is_none() {
            missing.push("--patch-config");
        }
        if output_file.is_none() {
            missing.push("--output-file");
        }
        if !missing.is_empty() {
            missing.sort_unstable();
            problems.push(format!(
                "missing required argument(s): {}",
                missing.join(", ")
            ));
        }

        let mut invalid = Vec::new();
        for (flag, path) in [
            ("--applies-to-dist", &self.applies_to_dist),
            ("--updated-dist", &self.updated_dist),
        ] {
            if let Some(path) = path
                && !path.is_dir()
            {
                invalid.push(format!("{} {} is not a directory", flag, path.display()));
            }
        }
        if let Some(config) = &self.patch_config
            && !config.is_file()
        {
            invalid.push(format!("--patch-config {} is not a file", config.display()));
        }
        if let Some(output) = &output_file
            && output.is_dir()
        {
            invalid.push(format!("--output-file {} is a directory", output.display()));
        }
        if let Some(previous) = &self.combine_with
            && !previous.is_file()
        {
            invalid.push(format!(
                "--combine-with {} does not exist",
                previous.display()
            ));
        }
        invalid.sort();
        problems.extend(invalid);

        let (true, Some(applies_to_dist), Some(updated_dist), Some(patch_config), Some(output_file)) = (
            problems.is_empty(),
            self.applies_to_dist,
            self.updated_dist,
            self.patch_config,
            output_file,
        ) else {
            return Err(Error::ConfigurationError(problems.join("; ")));
        };

        let misc_allowlist = self
            .skip_misc_files
            .then(|| MiscFileAllowlist::new(&self.included_misc_files));

        Ok(ValidatedRequest {
            applies_to_dist,
            updated_dist,
            patch_config,
            output_file,
            combine_with: self.combine_with,
            options: GenerationOptions {
                include_version: self.include_version,
                depth: if self.detailed_inspection {
                    InspectionDepth::Detailed
                } else {
                    InspectionDepth::Shallow
                },
                skip_layers_without_config: self.skip_layers_without_config,
                misc_allowlist,
                strict_layers: self.strict_layers,
                work_dir: self.work_dir.unwrap_or_else(std::env::temp_dir),
            },
        })
    }
}

/// `patch-<epoch millis>.tar.gz` next to the updated distribution
fn default_output(updated_dist: &Path) -> PathBuf {
    let name = format!("patch-{}.tar.gz", chrono::Utc::now().timestamp_millis());
    match updated_dist.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}
