use std::sync::Arc;

use sfpkg_cli::apex::TestResolver;
use sfpkg_cli::core::SfpkgError;
use sfpkg_cli::manifest::Manifest;
use sfpkg_cli::pipeline::Pipeline;
use sfpkg_cli::project::SearchMode;
use sfpkg_cli::test_utils::{SourceTree, init_test_logging};

/// `@tests: Foo, Bar` selects both; deleting Bar.cls leaves Foo
#[tokio::test]
async fn test_declared_tests_follow_the_filesystem() {
    init_test_logging(None);
    let tree = SourceTree::new().unwrap();
    tree.add_class("Service", "/* @tests: Foo, Bar */\npublic class Service {}").unwrap();
    tree.add_class("Foo", "@isTest class Foo {}").unwrap();
    let bar = tree.add_class("Bar", "@isTest class Bar {}").unwrap();

    let mut manifest = Manifest::new();
    manifest.add_member("ApexClass", "Service");

    let resolver = TestResolver::new(Arc::new(tree.directories(SearchMode::Recursive).unwrap()), 4);
    let selection = resolver.resolve(&manifest, &[]).await.unwrap();
    assert_eq!(selection.to_cli_string(), "Bar Foo");

    std::fs::remove_file(bar).unwrap();
    let selection = resolver.resolve(&manifest, &[]).await.unwrap();
    assert_eq!(selection.to_cli_string(), "Foo");
}

/// An `@isTest` class deployed on its own is its own test
#[tokio::test]
async fn test_is_test_class_end_to_end() {
    let tree = SourceTree::new().unwrap();
    tree.add_class("AccountHandler", "@isTest\npublic class AccountHandler {\n}\n").unwrap();
    let manual = tree
        .write_manifest("manifest/package.xml", &[("ApexClass", &["AccountHandler"])], Some("60.0"))
        .unwrap();

    let mut config = tree.config();
    config.sources.manifest = Some(manual);
    let outcome = Pipeline::new(config.clone()).run().await.unwrap();

    assert_eq!(outcome.tests.selection().unwrap().sorted(), vec!["AccountHandler"]);
    assert_eq!(std::fs::read_to_string(&config.output.tests).unwrap(), "AccountHandler");
}

/// Triggers are resolved from `.trigger` files
#[tokio::test]
async fn test_trigger_tests() {
    let tree = SourceTree::new().unwrap();
    tree.add_trigger(
        "LeadTrigger",
        "// @Tests: LeadTriggerTest\ntrigger LeadTrigger on Lead (after insert) {}",
    )
    .unwrap();
    tree.add_class("LeadTriggerTest", "@isTest class LeadTriggerTest {}").unwrap();
    let manual = tree
        .write_manifest("manifest/package.xml", &[("ApexTrigger", &["LeadTrigger"])], None)
        .unwrap();

    let mut config = tree.config();
    config.search = SearchMode::Conventional;
    config.sources.manifest = Some(manual);
    let outcome = Pipeline::new(config).run().await.unwrap();
    assert_eq!(outcome.tests.to_cli_string(), "LeadTriggerTest");
}

/// A class without annotations contributes nothing, so the run fails
#[tokio::test]
async fn test_no_annotations_means_no_valid_tests() {
    let tree = SourceTree::new().unwrap();
    tree.add_class("Plain", "public class Plain {}").unwrap();
    let manual =
        tree.write_manifest("manifest/package.xml", &[("ApexClass", &["Plain"])], None).unwrap();

    let mut config = tree.config();
    config.sources.manifest = Some(manual);
    let err = Pipeline::new(config.clone()).run().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<SfpkgError>(), Some(SfpkgError::NoValidTests { .. })));
    assert!(!config.output.tests.exists());
}

/// An Apex member without a source file is fatal
#[tokio::test]
async fn test_missing_apex_source() {
    let tree = SourceTree::new().unwrap();
    let manual =
        tree.write_manifest("manifest/package.xml", &[("ApexClass", &["Ghost"])], None).unwrap();

    let mut config = tree.config();
    config.sources.manifest = Some(manual);
    let err = Pipeline::new(config).run().await.unwrap_err();
    match err.downcast_ref::<SfpkgError>() {
        Some(SfpkgError::SourceNotFound {
            member,
            file_name,
            ..
        }) => {
            assert_eq!(member, "Ghost");
            assert_eq!(file_name, "Ghost.cls");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Pool size does not change the result
#[tokio::test]
async fn test_pool_size_is_irrelevant() {
    let tree = SourceTree::new().unwrap();
    let mut manifest = Manifest::new();
    for i in 0..40 {
        let name = format!("Handler{i:02}");
        let body = format!("// @tests: Suite{}\npublic class {name} {{}}", i % 7);
        tree.add_class(&name, &body).unwrap();
        manifest.add_member("ApexClass", name);
    }
    for i in 0..7 {
        tree.add_class(&format!("Suite{i}"), "@isTest class S {}").unwrap();
    }

    let directories = Arc::new(tree.directories(SearchMode::Recursive).unwrap());
    let one = TestResolver::new(Arc::clone(&directories), 1).resolve(&manifest, &[]).await.unwrap();
    let many = TestResolver::new(directories, 32).resolve(&manifest, &[]).await.unwrap();
    assert_eq!(one, many);
    assert_eq!(many.to_file_string(), "Suite0,Suite1,Suite2,Suite3,Suite4,Suite5,Suite6");
}
