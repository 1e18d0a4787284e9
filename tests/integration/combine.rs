use sfpkg_cli::config::{BranchSource, Mode};
use sfpkg_cli::pipeline::Pipeline;
use sfpkg_cli::test_utils::SourceTree;

fn branch(tree: &SourceTree, name: &str, tests: Option<&str>) -> BranchSource {
    BranchSource {
        name: name.to_string(),
        manifest: tree.path(&format!("branches/{name}/package.xml")),
        tests: tests.map(|_| tree.path(&format!("branches/{name}/runTests.txt"))),
    }
}

#[tokio::test]
async fn test_combine_branches_end_to_end() {
    let tree = SourceTree::new().unwrap();
    tree.add_class("LeadTest", "@isTest class LeadTest {}").unwrap();
    tree.add_class("caseTest", "@isTest class caseTest {}").unwrap();

    tree.write_manifest(
        "branches/leads/package.xml",
        &[("ApexClass", &["LeadService"])],
        Some("58.0"),
    )
    .unwrap();
    tree.write("branches/leads/runTests.txt", "LeadTest").unwrap();
    tree.write_manifest(
        "branches/cases/package.xml",
        &[("ApexClass", &["CaseService"]), ("Layout", &["Case-Layout"])],
        None,
    )
    .unwrap();
    tree.write("branches/cases/runTests.txt", "caseTest, GoneTest").unwrap();
    tree.write_manifest(
        "branches/layouts/package.xml",
        &[("Layout", &["Lead-Layout"])],
        Some("61.0"),
    )
    .unwrap();

    let mut config = tree.config();
    config.mode = Mode::Combine;
    config.branches = vec![
        branch(&tree, "leads", Some("runTests.txt")),
        branch(&tree, "cases", Some("runTests.txt")),
        branch(&tree, "layouts", None),
    ];

    let outcome = Pipeline::new(config.clone()).run().await.unwrap();
    assert_eq!(outcome.manifest.version().unwrap().as_str(), "61.0");
    assert_eq!(outcome.manifest.get("ApexClass").unwrap().len(), 2);
    assert_eq!(outcome.manifest.get("Layout").unwrap().len(), 2);
    assert_eq!(outcome.tests.to_cli_string(), "caseTest LeadTest");
    assert_eq!(std::fs::read_to_string(&config.output.tests).unwrap(), "caseTest,LeadTest");
}

#[tokio::test]
async fn test_combine_without_versions_has_no_version() {
    let tree = SourceTree::new().unwrap();
    tree.write_manifest("branches/a/package.xml", &[("Layout", &["A-Layout"])], None).unwrap();
    tree.write_manifest("branches/b/package.xml", &[("Layout", &["B-Layout"])], None).unwrap();

    let mut config = tree.config();
    config.mode = Mode::Combine;
    config.branches = vec![branch(&tree, "a", None), branch(&tree, "b", None)];

    let outcome = Pipeline::new(config).run().await.unwrap();
    assert!(outcome.manifest.version().is_none());
    assert_eq!(outcome.tests.to_cli_string(), "not a test");
}

/// A branch that deploys no Apex contributes no tests, even with a test list on disk
#[tokio::test]
async fn test_branch_without_apex_ignores_its_test_list() {
    let tree = SourceTree::new().unwrap();
    tree.add_class("LeadTest", "@isTest class LeadTest {}").unwrap();
    tree.add_class("StaleTest", "@isTest class StaleTest {}").unwrap();

    tree.write_manifest("branches/leads/package.xml", &[("ApexClass", &["LeadService"])], None)
        .unwrap();
    tree.write("branches/leads/runTests.txt", "LeadTest").unwrap();
    tree.write_manifest("branches/layouts/package.xml", &[("Layout", &["Lead-Layout"])], None)
        .unwrap();
    tree.write("branches/layouts/runTests.txt", "StaleTest").unwrap();

    let mut config = tree.config();
    config.mode = Mode::Combine;
    config.branches = vec![
        branch(&tree, "leads", Some("runTests.txt")),
        branch(&tree, "layouts", Some("runTests.txt")),
    ];

    let outcome = Pipeline::new(config).run().await.unwrap();
    assert!(outcome.manifest.get("Layout").unwrap().contains("Lead-Layout"));
    assert_eq!(outcome.tests.to_cli_string(), "LeadTest");
}
