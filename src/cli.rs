// src/cli.rs

//! CLI definitions for patchgen
//!
//! Argument parsing only; the command implementations live in `commands`.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "patchgen")]
#[command(author = "patchgen contributors")]
#[command(version)]
#[command(about = "Generate patches between two versions of a modular server distribution", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a patch archive from two distributions
    Generate(GenerateArgs),

    /// Write a starter patch-config.toml
    Template(TemplateArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Root of the distribution the patch applies to
    #[arg(long, value_name = "DIR")]
    pub applies_to_dist: Option<PathBuf>,

    /// Root of the distribution the patch upgrades to
    #[arg(long, value_name = "DIR")]
    pub updated_dist: Option<PathBuf>,

    /// Patch configuration document
    #[arg(long, value_name = "FILE")]
    pub patch_config: Option<PathBuf>,

    /// Output archive (default: patch-<millis>.tar.gz next to the updated distribution)
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Compare version modules even for one-off patches
    #[arg(long)]
    pub include_version: bool,

    /// Ignore line ending and trailing whitespace changes in text resources
    #[arg(long)]
    pub detailed_inspection: bool,

    /// Previous cumulative patch to merge into the generated one
    #[arg(long, value_name = "FILE")]
    pub combine_with: Option<PathBuf>,

    /// Do not compare layers that have no entry in the patch config
    #[arg(long = "skip-layers-no-config")]
    pub skip_layers_without_config: bool,

    /// Leave misc files out of the patch
    #[arg(long)]
    pub skip_misc_files: bool,

    /// Misc files to keep despite --skip-misc-files (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    pub included_misc_files: Vec<String>,

    /// Fail when a compared layer has no entry in the patch config
    #[arg(long)]
    pub strict_layers: bool,

    /// Directory for the scratch workspace (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("kind").required(true).args(["one_off", "cumulative"])))]
pub struct TemplateArgs {
    /// Patch id
    #[arg(long)]
    pub patch_id: String,

    /// One-off patch for this version
    #[arg(long, value_name = "VERSION")]
    pub one_off: Option<String>,

    /// Cumulative patch from one version to another
    #[arg(long, num_args = 2, value_names = ["FROM", "TO"])]
    pub cumulative: Option<Vec<String>>,

    /// Layer or add-on to add an element for (repeatable)
    #[arg(long = "layer", value_name = "NAME")]
    pub layers: Vec<String>,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
