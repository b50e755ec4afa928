// tests/generate.rs

//! End-to-end patch generation tests.

mod common;

use common::{
    archive_metadata, cumulative_config, misc_summary, one_off_config, unpack, write_dist,
    write_file, Fixture, PRODUCT,
};
use patchgen::archive::{ArchiveMerger, TarArchiver};
use patchgen::{
    ContentItem, ContentWriter, Error, FsDistributionLoader, GenerationOrchestrator,
    GenerationRequest, ModificationType, PatchMetadata, PatchType,
};
use std::fs;
use std::path::Path;

fn generate(request: GenerationRequest) -> patchgen::Result<patchgen::GenerationReport> {
    GenerationOrchestrator::new().run(request)
}

#[test]
fn test_cumulative_patch_contents() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base", "extra"]));
    let output = fixture.output("cp1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    assert_eq!(report.output, output);
    assert_eq!(report.patch_type(), PatchType::Cumulative);
    assert!(!report.merged);
    assert!(output.is_file());

    let metadata = archive_metadata(&output);
    assert_eq!(metadata, report.metadata);
    assert_eq!(metadata.identity.name, PRODUCT);
    assert_eq!(metadata.identity.applies_to_version, "1.0");
    assert_eq!(metadata.identity.resulting_version.as_deref(), Some("1.1"));

    assert_eq!(
        misc_summary(&metadata),
        vec![
            ("bin/new.sh".to_string(), ModificationType::Add),
            ("bin/standalone.sh".to_string(), ModificationType::Modify),
        ]
    );

    let layers: Vec<_> = metadata.elements.iter().map(|e| e.layer.as_str()).collect();
    assert_eq!(layers, vec!["base", "extra"]);

    let base = metadata.element_by_layer("base").unwrap();
    assert_eq!(base.id, "base-cp1");
    let find = |name: &str| {
        base.modifications
            .iter()
            .find(|m| m.item == ContentItem::module(name, "main"))
            .map(|m| m.kind)
    };
    assert_eq!(find("org.jboss.as.added"), Some(ModificationType::Add));
    assert_eq!(find("org.jboss.as.removed"), Some(ModificationType::Remove));
    assert_eq!(find("org.jboss.as.server"), Some(ModificationType::Modify));
    // Cumulative patches always carry the version module
    assert_eq!(find("org.jboss.as.product"), Some(ModificationType::Modify));

    let unpacked = unpack(&output);
    let root = unpacked.path();
    assert_eq!(fs::read_to_string(root.join("misc/bin/new.sh")).unwrap(), "new\n");
    assert!(!root.join("misc/README.txt").exists());
    assert_eq!(
        fs::read_to_string(root.join("base-cp1/modules/org/jboss/as/server/main/org.jboss.as.server.jar"))
            .unwrap(),
        "server-1.1"
    );
    assert!(!root.join("base-cp1/modules/org/jboss/as/removed").exists());
    assert!(root.join("extra-cp1/modules/org/extra/main/module.xml").is_file());

    assert!(fixture.work_is_empty());
}

#[test]
fn test_layer_without_config_is_omitted() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base"]));
    let output = fixture.output("cp1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    let layers: Vec<_> = report.metadata.elements.iter().map(|e| e.layer.as_str()).collect();
    assert_eq!(layers, vec!["base"]);

    let root = unpack(&output);
    assert!(!root.path().join("extra-cp1").exists());
}

#[test]
fn test_strict_layers_rejects_unconfigured_layer() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base"]));
    let output = fixture.output("cp1.tar.gz");

    let mut request = fixture.request(&config, &output);
    request.strict_layers = true;
    let err = generate(request).unwrap_err();

    assert!(err.is_configuration(), "unexpected error: {}", err);
    assert!(err.to_string().contains("extra"));
    assert!(!output.exists());
    assert!(fixture.work_is_empty());
}

#[test]
fn test_skip_layers_without_config_does_not_visit() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base"]));
    let output = fixture.output("cp1.tar.gz");

    let mut request = fixture.request(&config, &output);
    request.strict_layers = true;
    request.skip_layers_without_config = true;
    let report = generate(request).unwrap();

    assert_eq!(report.metadata.elements.len(), 1);
}

#[test]
fn test_different_products_are_incompatible() {
    let fixture = Fixture::standard();
    write_dist(&fixture.updated, "Other", "1.1");
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base"]));
    let output = fixture.output("cp1.tar.gz");

    let err = generate(fixture.request(&config, &output)).unwrap_err();
    assert!(err.is_compatibility(), "unexpected error: {}", err);
    assert!(!output.exists());
    assert!(fixture.work_is_empty());
}

#[test]
fn test_declared_version_mismatch_is_incompatible() {
    let fixture = Fixture::standard();
    let config = fixture.config("oo.toml", &one_off_config("oo1", "0.9", &["base"]));
    let output = fixture.output("oo1.tar.gz");

    let err = generate(fixture.request(&config, &output)).unwrap_err();
    assert!(matches!(err, Error::CompatibilityError(_)));
    assert!(!output.exists());
}

#[test]
fn test_cumulative_with_equal_versions_succeeds() {
    let fixture = Fixture::standard();
    write_dist(&fixture.updated, PRODUCT, "1.0");
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.0", &["base", "extra"]));
    let output = fixture.output("cp1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    assert_eq!(report.metadata.identity.resulting_version.as_deref(), Some("1.0"));
    assert!(output.is_file());
}

#[test]
fn test_one_off_leaves_version_modules_out() {
    let fixture = Fixture::standard();
    let config = fixture.config("oo.toml", &one_off_config("oo1", "1.0", &["base", "extra"]));
    let output = fixture.output("oo1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    let base = report.metadata.element_by_layer("base").unwrap();
    assert!(base
        .modifications
        .iter()
        .all(|m| m.item != ContentItem::module("org.jboss.as.product", "main")));
    assert_eq!(report.metadata.identity.resulting_version, None);

    // --include-version brings it back
    let output = fixture.output("oo1-version.tar.gz");
    let mut request = fixture.request(&config, &output);
    request.include_version = true;
    let report = generate(request).unwrap();
    let base = report.metadata.element_by_layer("base").unwrap();
    assert!(base
        .modifications
        .iter()
        .any(|m| m.item == ContentItem::module("org.jboss.as.product", "main")));
}

#[test]
fn test_identical_runs_produce_identical_metadata() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base", "extra"]));
    let first = fixture.output("first.tar.gz");
    let second = fixture.output("second.tar.gz");

    let a = generate(fixture.request(&config, &first)).unwrap();
    let b = generate(fixture.request(&config, &second)).unwrap();

    assert_eq!(a.metadata, b.metadata);
    assert_eq!(a.metadata.to_json().unwrap(), b.metadata.to_json().unwrap());
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_optional_paths_follow_declaration_order() {
    let fixture = Fixture::standard();
    write_file(&fixture.updated, "extras/tool.sh", "tool\n");
    write_file(&fixture.updated, "docs/new.html", "<html/>");

    let mut content = cumulative_config("cp1", "1.0", "1.1", &["base", "extra"]);
    content.push_str(
        "\n[[optional-path]]\npath = \"appclient\"\n\n[[optional-path]]\npath = \"extras\"\nrequires = \"appclient\"\n\n[[optional-path]]\npath = \"docs\"\n",
    );
    let config = fixture.config("cp.toml", &content);
    let output = fixture.output("cp1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    let misc = &report.metadata.misc;

    // appclient is absent, so extras (which requires it) is dropped
    assert!(misc.iter().all(|m| m.item != ContentItem::misc("extras/tool.sh")));

    let docs = misc
        .iter()
        .find(|m| m.item == ContentItem::misc("docs/new.html"))
        .unwrap();
    let optional = docs.optional.as_ref().unwrap();
    assert_eq!(optional.path, "docs");
    assert_eq!(optional.requires, None);
}

#[test]
fn test_forward_requires_is_configuration_error() {
    let fixture = Fixture::standard();
    let mut content = cumulative_config("cp1", "1.0", "1.1", &["base"]);
    content.push_str(
        "\n[[optional-path]]\npath = \"docs/examples\"\nrequires = \"docs\"\n\n[[optional-path]]\npath = \"docs\"\n",
    );
    let config = fixture.config("cp.toml", &content);
    let output = fixture.output("cp1.tar.gz");

    let err = generate(fixture.request(&config, &output)).unwrap_err();
    assert!(err.is_configuration());
    assert!(!output.exists());
    assert!(fixture.work_is_empty());
}

#[test]
fn test_skip_misc_files_with_allowlist() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base"]));
    let output = fixture.output("cp1.tar.gz");

    let mut request = fixture.request(&config, &output);
    request.skip_misc_files = true;
    request.included_misc_files = vec!["bin/new.sh".to_string()];
    let report = generate(request).unwrap();

    assert_eq!(
        misc_summary(&report.metadata),
        vec![("bin/new.sh".to_string(), ModificationType::Add)]
    );
    assert!(report.metadata.element_by_layer("base").is_some());
}

#[test]
fn test_runtime_use_items_marked() {
    let fixture = Fixture::standard();
    let content = cumulative_config("cp1", "1.0", "1.1", &["base"]).replace(
        "description = \"test patch\"",
        "description = \"test patch\"\nin-runtime-use = [\"bin/standalone.sh\"]",
    );
    let config = fixture.config("cp.toml", &content);
    let output = fixture.output("cp1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    let marked: Vec<_> = report
        .metadata
        .misc
        .iter()
        .filter(|m| m.in_runtime_use)
        .filter_map(|m| m.item.relative_file())
        .collect();
    assert_eq!(marked, vec!["bin/standalone.sh"]);
}

#[test]
fn test_explicit_content_only() {
    let fixture = Fixture::standard();
    let content = "[patch]\nid = \"oo1\"\ngenerate-by-diff = false\nspecified-content = [\"bin/new.sh\"]\n\n[patch.one-off]\napplies-to-version = \"1.0\"\n\n[[element]]\nname = \"base\"\n";
    let config = fixture.config("oo.toml", content);
    let output = fixture.output("oo1.tar.gz");

    let report = generate(fixture.request(&config, &output)).unwrap();
    assert_eq!(
        misc_summary(&report.metadata),
        vec![("bin/new.sh".to_string(), ModificationType::Add)]
    );
    assert!(report.metadata.elements.is_empty());
}

#[test]
fn test_detailed_inspection_ignores_whitespace_noise() {
    let fixture = Fixture::standard();
    write_file(&fixture.base, "standalone/configuration/standalone.xml", "<server>\r\n</server>\r\n");
    write_file(&fixture.updated, "standalone/configuration/standalone.xml", "<server>  \n</server>\n\n");
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base", "extra"]));
    let xml = ContentItem::misc("standalone/configuration/standalone.xml");

    let shallow = generate(fixture.request(&config, &fixture.output("shallow.tar.gz"))).unwrap();
    assert!(shallow.metadata.misc.iter().any(|m| m.item == xml));

    let mut request = fixture.request(&config, &fixture.output("detailed.tar.gz"));
    request.detailed_inspection = true;
    let detailed = generate(request).unwrap();
    assert!(detailed.metadata.misc.iter().all(|m| m.item != xml));
}

#[test]
fn test_duplicate_layer_in_config() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base", "base"]));
    let output = fixture.output("cp1.tar.gz");

    let err = generate(fixture.request(&config, &output)).unwrap_err();
    assert!(matches!(err, Error::DuplicateElementError(ref name) if name == "base"));
    assert!(fixture.work_is_empty());
}

#[test]
fn test_missing_inputs_reported_together() {
    let err = generate(GenerationRequest::default()).unwrap_err();
    assert!(err.is_configuration());
    assert!(err
        .to_string()
        .contains("--applies-to-dist, --output-file, --patch-config, --updated-dist"));

    // A conflicting flag does not hide the missing inputs
    let fixture = Fixture::standard();
    let mut request = fixture.request(&fixture.path().join("absent.toml"), &fixture.output("p.tar.gz"));
    request.updated_dist = None;
    request.included_misc_files = vec!["bin/new.sh".to_string()];
    let message = generate(request).unwrap_err().to_string();
    assert!(message.contains("--skip-misc-files"));
    assert!(message.contains("missing required argument(s): --updated-dist"));
    assert!(message.contains("--patch-config"));
    assert!(fixture.work_is_empty());
}

/// Writer that fails after touching the workspace
struct FailingWriter;

impl ContentWriter for FailingWriter {
    fn write(&self, workspace: &Path, _source_root: &Path, _patch: &PatchMetadata) -> patchgen::Result<()> {
        fs::write(workspace.join("misc/partial"), "partial").unwrap();
        Err(Error::io(workspace, std::io::Error::other("disk full")))
    }
}

#[test]
fn test_workspace_removed_when_writing_fails() {
    let fixture = Fixture::standard();
    let config = fixture.config("cp.toml", &cumulative_config("cp1", "1.0", "1.1", &["base"]));
    let output = fixture.output("cp1.tar.gz");

    let orchestrator = GenerationOrchestrator::with_components(
        FsDistributionLoader::new(),
        FailingWriter,
        TarArchiver::new(),
        ArchiveMerger::new(TarArchiver::new()),
    );
    let err = orchestrator.run(fixture.request(&config, &output)).unwrap_err();

    assert!(err.is_io());
    assert!(!output.exists());
    assert!(fixture.work_is_empty());
}

#[test]
fn test_element_id_escaping_workspace_rejected() {
    let fixture = Fixture::standard();
    let content = cumulative_config("cp1", "1.0", "1.1", &["base"])
        .replace("id = \"base-cp1\"", "id = \"../outside\"");
    let config = fixture.config("cp.toml", &content);
    let output = fixture.output("cp1.tar.gz");

    let err = generate(fixture.request(&config, &output)).unwrap_err();
    assert!(err.is_configuration(), "unexpected error: {}", err);
    assert!(!fixture.path().join("outside").exists());
    assert!(!output.exists());
    assert!(fixture.work_is_empty());
}
