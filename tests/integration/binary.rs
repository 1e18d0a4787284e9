//! The `sfpkg` executable: configuration from file and environment, the
//! stdout contract, and exit status.

use assert_cmd::Command;
use predicates::prelude::*;
use sfpkg_cli::test_utils::SourceTree;

fn sfpkg(tree: &SourceTree) -> Command {
    let mut cmd = Command::cargo_bin("sfpkg").unwrap();
    cmd.current_dir(tree.root())
        .env_remove("SFPKG_CONFIG")
        .env_remove("SFPKG_STAGE")
        .env_remove("SFPKG_ENVIRONMENT")
        .env_remove("SFPKG_MESSAGE")
        .env_remove("SFPKG_MESSAGE_FILE")
        .env("RUST_LOG", "info");
    cmd
}

/// Defaults read the diff-tool manifest and print the resolved tests
#[test]
fn test_default_config_prints_tests() {
    let tree = SourceTree::new().unwrap();
    tree.add_class("AccountHandler", "@isTest\npublic class AccountHandler {}").unwrap();
    tree.write_manifest(
        "changed-sources/package/package.xml",
        &[("ApexClass", &["AccountHandler"])],
        Some("60.0"),
    )
    .unwrap();

    sfpkg(&tree).assert().success().stdout("AccountHandler\n");

    assert_eq!(std::fs::read_to_string(tree.path("runTests.txt")).unwrap(), "AccountHandler");
    let manifest = std::fs::read_to_string(tree.path("package.xml")).unwrap();
    assert!(manifest.contains("<members>AccountHandler</members>"));
}

/// No Apex prints the sentinel
#[test]
fn test_sentinel_without_apex() {
    let tree = SourceTree::new().unwrap();
    tree.write_manifest(
        "changed-sources/package/package.xml",
        &[("Layout", &["Case-Layout"])],
        None,
    )
    .unwrap();

    sfpkg(&tree).assert().success().stdout("not a test\n");
}

/// Config file and environment overrides work together
#[test]
fn test_config_file_and_env_overrides() {
    let tree = SourceTree::new().unwrap();
    tree.add_class("Service", "// @tests: ServiceTest\npublic class Service {}").unwrap();
    tree.add_class("ServiceTest", "@isTest\nclass ServiceTest {}").unwrap();
    tree.add_class("SmokeTest", "@isTest\nclass SmokeTest {}").unwrap();
    tree.write_manifest("manifest/package.xml", &[("ApexClass", &["Service"])], None).unwrap();
    tree.write(
        "ci/sfpkg.toml",
        r#"
search = "conventional"
concurrency = 2

[sources]
manifest = "manifest/package.xml"

[output]
manifest = "build/package.xml"
tests = "build/runTests.txt"
"#,
    )
    .unwrap();

    sfpkg(&tree)
        .env("SFPKG_CONFIG", "ci/sfpkg.toml")
        .env("SFPKG_STAGE", "validate")
        .env("SFPKG_MESSAGE", "Deploy service\n\nApex::SmokeTest::Apex")
        .assert()
        .success()
        .stdout("ServiceTest SmokeTest\n");

    assert_eq!(
        std::fs::read_to_string(tree.path("build/runTests.txt")).unwrap(),
        "ServiceTest,SmokeTest"
    );
}

/// A banned type exits non-zero and names the replacement types
#[test]
fn test_banned_type_fails_with_guidance() {
    let tree = SourceTree::new().unwrap();
    tree.write_manifest("changed-sources/package/package.xml", &[("Workflow", &["Account"])], None)
        .unwrap();

    sfpkg(&tree)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Type 'Workflow' is not allowed"))
        .stderr(predicate::str::contains("WorkflowRule"));

    assert!(!tree.path("package.xml").exists());
}

/// An unknown stage in the environment is a configuration error
#[test]
fn test_unknown_stage_fails() {
    let tree = SourceTree::new().unwrap();
    sfpkg(&tree)
        .env("SFPKG_STAGE", "ship")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown stage 'ship'"));
}

/// A missing required manifest fails with the path in the message
#[test]
fn test_missing_diff_manifest_fails() {
    let tree = SourceTree::new().unwrap();
    sfpkg(&tree)
        .assert()
        .failure()
        .stderr(predicate::str::contains("changed-sources/package/package.xml"));
}
