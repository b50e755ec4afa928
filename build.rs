// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: optional path value
fn path_arg(id: &'static str, long: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).value_name(value_name).help(help)
}

/// Common argument: boolean switch
fn flag_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("patchgen")
        .version(env!("CARGO_PKG_VERSION"))
        .author("patchgen contributors")
        .about("Generate patches between two versions of a modular server distribution")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a patch archive from two distributions")
                .arg(path_arg("applies_to_dist", "applies-to-dist", "DIR", "Root of the distribution the patch applies to"))
                .arg(path_arg("updated_dist", "updated-dist", "DIR", "Root of the distribution the patch upgrades to"))
                .arg(path_arg("patch_config", "patch-config", "FILE", "Patch configuration document"))
                .arg(path_arg("output_file", "output-file", "FILE", "Output archive"))
                .arg(flag_arg("include_version", "include-version", "Compare version modules even for one-off patches"))
                .arg(flag_arg("detailed_inspection", "detailed-inspection", "Ignore line ending and trailing whitespace changes in text resources"))
                .arg(path_arg("combine_with", "combine-with", "FILE", "Previous cumulative patch to merge into the generated one"))
                .arg(flag_arg("skip_layers_without_config", "skip-layers-no-config", "Do not compare layers that have no entry in the patch config"))
                .arg(flag_arg("skip_misc_files", "skip-misc-files", "Leave misc files out of the patch"))
                .arg(
                    Arg::new("included_misc_files")
                        .long("included-misc-files")
                        .value_name("PATHS")
                        .value_delimiter(',')
                        .help("Misc files to keep despite --skip-misc-files"),
                )
                .arg(flag_arg("strict_layers", "strict-layers", "Fail when a compared layer has no entry in the patch config"))
                .arg(path_arg("work_dir", "work-dir", "DIR", "Directory for the scratch workspace")),
        )
        .subcommand(
            Command::new("template")
                .about("Write a starter patch-config.toml")
                .arg(Arg::new("patch_id").long("patch-id").required(true).help("Patch id"))
                .arg(path_arg("one_off", "one-off", "VERSION", "One-off patch for this version"))
                .arg(
                    Arg::new("cumulative")
                        .long("cumulative")
                        .num_args(2)
                        .value_names(["FROM", "TO"])
                        .help("Cumulative patch from one version to another"),
                )
                .arg(
                    Arg::new("layers")
                        .long("layer")
                        .value_name("NAME")
                        .action(ArgAction::Append)
                        .help("Layer or add-on to add an element for"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write to a file instead of stdout"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("patchgen.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
