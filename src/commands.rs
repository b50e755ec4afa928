// src/commands.rs

//! Command handlers for the patchgen CLI

use crate::cli::{GenerateArgs, TemplateArgs};
use anyhow::{Context, Result};
use patchgen::spec::{PatchConfigDocument, PatchType};
use patchgen::{GenerationOrchestrator, GenerationRequest};
use tracing::info;

/// Generate a patch archive
pub fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let request = GenerationRequest {
        applies_to_dist: args.applies_to_dist,
        updated_dist: args.updated_dist,
        patch_config: args.patch_config,
        output_file: args.output_file,
        combine_with: args.combine_with,
        include_version: args.include_version,
        detailed_inspection: args.detailed_inspection,
        skip_layers_without_config: args.skip_layers_without_config,
        skip_misc_files: args.skip_misc_files,
        included_misc_files: args.included_misc_files,
        strict_layers: args.strict_layers,
        work_dir: args.work_dir,
    };

    let report = GenerationOrchestrator::new()
        .run(request)
        .context("Patch generation failed")?;

    let metadata = &report.metadata;
    println!(
        "Created {} patch {} for {} {}",
        report.patch_type(),
        report.patch_id(),
        metadata.identity.name,
        metadata.identity.applies_to_version
    );
    if let Some(resulting) = &metadata.identity.resulting_version {
        println!("  Resulting version: {}", resulting);
    }
    println!("  Misc changes: {}", metadata.misc.len());
    for element in &metadata.elements {
        println!(
            "  {} {}: {} changes ({})",
            if element.add_on { "Add-on" } else { "Layer" },
            element.layer,
            element.modifications.len(),
            element.patch_type
        );
    }
    if report.merged {
        println!("  Merged with previous patch");
    }
    println!("  Output: {}", report.output.display());
    Ok(())
}

/// Write a starter patch config
pub fn cmd_template(args: TemplateArgs) -> Result<()> {
    let (patch_type, from, to) = match (&args.one_off, &args.cumulative) {
        (Some(version), _) => (PatchType::OneOff, version.as_str(), None),
        (None, Some(versions)) => match versions.as_slice() {
            [from, to] => (PatchType::Cumulative, from.as_str(), Some(to.as_str())),
            _ => anyhow::bail!("--cumulative takes exactly two versions"),
        },
        (None, None) => anyhow::bail!("either --one-off or --cumulative is required"),
    };

    let document = PatchConfigDocument::template(&args.patch_id, patch_type, from, to, &args.layers);
    let content = document
        .to_toml()
        .context("Failed to render patch config")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote patch config template to {}", path.display());
            println!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
