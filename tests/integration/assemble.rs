use sfpkg_cli::apex::TestRequirement;
use sfpkg_cli::manifest::parser::parse_manifest;
use sfpkg_cli::pipeline::Pipeline;
use sfpkg_cli::test_utils::{SourceTree, init_test_logging};

/// Diff-tool output and the static manifest are unioned per type
#[tokio::test]
async fn test_union_of_diff_and_static_manifest() {
    init_test_logging(None);
    let tree = SourceTree::new().unwrap();
    let diff = tree
        .write_manifest(
            "changed-sources/package/package.xml",
            &[
                ("CustomField", &["Account.Tier__c", "Case.Origin__c"]),
                ("Layout", &["Account-Account Layout"]),
            ],
            Some("62.0"),
        )
        .unwrap();
    let manual = tree
        .write_manifest(
            "manifest/package.xml",
            &[("CustomField", &["Account.Tier__c", "Lead.Score__c"])],
            Some("60.0"),
        )
        .unwrap();

    let mut config = tree.config();
    config.sources.diff = Some(diff);
    config.sources.manifest = Some(manual);

    let outcome = Pipeline::new(config.clone()).run().await.unwrap();
    let fields: Vec<&str> = outcome.manifest.get("CustomField").unwrap().members().collect();
    assert_eq!(fields, vec!["Account.Tier__c", "Case.Origin__c", "Lead.Score__c"]);
    assert_eq!(outcome.manifest.version().unwrap().as_str(), "60.0");
    assert_eq!(outcome.tests, TestRequirement::NotRequired);

    // The written manifest parses back to the same content
    let written = std::fs::read_to_string(&config.output.manifest).unwrap();
    let reparsed = parse_manifest(&written, "output", &config.policy).unwrap();
    assert_eq!(reparsed, outcome.manifest);
}

/// Re-running on the pipeline's own output changes nothing
#[tokio::test]
async fn test_rerun_on_output_is_stable() {
    let tree = SourceTree::new().unwrap();
    let manual = tree
        .write_manifest(
            "manifest/package.xml",
            &[("CustomObject", &["b__c", "A__c", "c__c"])],
            Some("61.0"),
        )
        .unwrap();

    let mut config = tree.config();
    config.sources.manifest = Some(manual);
    let first = Pipeline::new(config.clone()).run().await.unwrap();

    config.sources.manifest = Some(config.output.manifest.clone());
    config.sources.diff = Some(config.output.manifest.clone());
    let second = Pipeline::new(config).run().await.unwrap();
    assert_eq!(first.rendered, second.rendered);
    assert!(first.rendered.find("A__c") < first.rendered.find("b__c"));
}

/// A wildcard in the diff output is filtered before validation
#[tokio::test]
async fn test_wildcard_never_reaches_output() {
    let tree = SourceTree::new().unwrap();
    let diff = tree
        .write_manifest(
            "diff/package.xml",
            &[("CustomObject", &["*", "Account"]), ("Layout", &["Case-Layout"])],
            None,
        )
        .unwrap();

    let mut config = tree.config();
    config.sources.diff = Some(diff);

    let outcome = Pipeline::new(config).run().await.unwrap();
    assert!(!outcome.rendered.contains("<members>*</members>"));
    assert!(outcome.manifest.get("CustomObject").unwrap().contains("Account"));
}

/// The diff tool's version is ignored unless trusted; the project version fills in
#[tokio::test]
async fn test_version_resolution() {
    let tree = SourceTree::new().unwrap();
    let diff = tree
        .write_manifest("diff/package.xml", &[("Layout", &["Case-Layout"])], Some("63.0"))
        .unwrap();

    let mut config = tree.config();
    config.sources.diff = Some(diff);
    let outcome = Pipeline::new(config.clone()).run().await.unwrap();
    assert!(outcome.manifest.version().is_none());
    assert!(!outcome.rendered.contains("<version>"));

    config.policy.project_version_fallback = true;
    let outcome = Pipeline::new(config.clone()).run().await.unwrap();
    assert_eq!(outcome.manifest.version().unwrap().as_str(), "60.0");

    config.policy.trust_diff_version = true;
    let outcome = Pipeline::new(config).run().await.unwrap();
    assert_eq!(outcome.manifest.version().unwrap().as_str(), "63.0");
}

/// A manifest pasted into the commit message is merged in
#[tokio::test]
async fn test_message_manifest_is_merged() {
    let tree = SourceTree::new().unwrap();
    let diff =
        tree.write_manifest("diff/package.xml", &[("Layout", &["Case-Layout"])], None).unwrap();

    let mut config = tree.config();
    config.sources.diff = Some(diff);
    config.sources.message = Some(
        r#"Add the settings page

<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="http://soap.sforce.com/2006/04/metadata">
    <types>
        <members>Settings</members>
        <name>ApexPage</name>
    </types>
    <version>59.0</version>
</Package>
"#
        .to_string(),
    );

    let outcome = Pipeline::new(config).run().await.unwrap();
    assert!(outcome.manifest.get("ApexPage").unwrap().contains("Settings"));
    assert!(outcome.manifest.get("Layout").unwrap().contains("Case-Layout"));
    assert_eq!(outcome.manifest.version().unwrap().as_str(), "59.0");
}

/// A type listed only as `*` is dropped at merge time and the run goes on
#[tokio::test]
async fn test_wildcard_only_type_is_dropped() {
    let tree = SourceTree::new().unwrap();
    let diff = tree
        .write_manifest(
            "diff/package.xml",
            &[("CustomObject", &["*"]), ("Layout", &["Case-Layout"])],
            None,
        )
        .unwrap();

    let mut config = tree.config();
    config.sources.diff = Some(diff);

    let outcome = Pipeline::new(config).run().await.unwrap();
    assert!(outcome.manifest.get("CustomObject").is_none());
    assert!(!outcome.rendered.contains("CustomObject"));
    assert!(outcome.manifest.get("Layout").unwrap().contains("Case-Layout"));
    assert_eq!(outcome.report.types, 1);
}
