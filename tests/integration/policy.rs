use sfpkg_cli::config::Mode;
use sfpkg_cli::core::{EnvironmentClass, SfpkgError, Stage};
use sfpkg_cli::pipeline::Pipeline;
use sfpkg_cli::test_utils::SourceTree;

fn policy_error(err: &anyhow::Error) -> Option<&SfpkgError> {
    err.downcast_ref::<SfpkgError>()
}

fn package(body: &str) -> String {
    format!(r#"<Package xmlns="http://soap.sforce.com/2006/04/metadata">{body}</Package>"#)
}

/// An empty manifest fails in every stage and environment
#[tokio::test]
async fn test_empty_manifest_always_fails() {
    let tree = SourceTree::new().unwrap();
    let manual = tree.write_manifest("manifest/package.xml", &[], Some("60.0")).unwrap();

    for stage in [Stage::Deploy, Stage::Validate, Stage::Destroy] {
        for environment in [EnvironmentClass::Production, EnvironmentClass::NonProduction] {
            let mut config = tree.config();
            config.stage = stage;
            config.environment = environment;
            config.sources.manifest = Some(manual.clone());

            let err = Pipeline::new(config).run().await.unwrap_err();
            assert!(
                matches!(policy_error(&err), Some(SfpkgError::PolicyViolation { .. })),
                "{stage} / {environment:?}: {err:#}"
            );
        }
    }
}

/// Workflow alone fails whatever its members
#[tokio::test]
async fn test_workflow_only_manifest_fails() {
    let tree = SourceTree::new().unwrap();
    for members in [&["Account"][..], &["Account", "Opportunity"][..]] {
        let manual =
            tree.write_manifest("manifest/package.xml", &[("Workflow", members)], None).unwrap();
        let mut config = tree.config();
        config.sources.manifest = Some(manual);

        let err = Pipeline::new(config).run().await.unwrap_err();
        assert!(matches!(policy_error(&err), Some(SfpkgError::PolicyViolation { .. })));
        assert!(err.to_string().contains("WorkflowAlert"));
    }
}

/// Schema problems in a checked manifest are reported before policy problems
#[tokio::test]
async fn test_check_mode_schema_violations() {
    let tree = SourceTree::new().unwrap();
    let apex = "<types><members>A</members><name>ApexClass</name></types>";
    let cases = [
        (package(&format!("{apex}<fullName>x</fullName>")), "fullName"),
        (
            format!(
                r#"<Packages xmlns="http://soap.sforce.com/2006/04/metadata">{apex}</Packages>"#
            ),
            "Packages",
        ),
        (format!(r#"<Package xmlns="urn:wrong">{apex}</Package>"#), "Namespace"),
    ];

    for (xml, needle) in cases {
        let manual = tree.write("manifest/package.xml", &xml).unwrap();
        let mut config = tree.config();
        config.mode = Mode::Check;
        config.sources.manifest = Some(manual);

        let err = Pipeline::new(config).run().await.unwrap_err();
        let error = policy_error(&err).unwrap();
        assert!(matches!(error, SfpkgError::SchemaViolation { .. }), "{error}");
        assert!(error.to_string().contains(needle), "{error}");
    }
}

/// Name and version cardinality, and empty member lists, are policy violations
#[tokio::test]
async fn test_check_mode_cardinality_violations() {
    let tree = SourceTree::new().unwrap();
    let cases = [
        package(
            "<types><members>A</members><name>ApexClass</name></types>\
             <version>59.0</version><version>60.0</version>",
        ),
        package("<types><members>A</members></types>"),
        package("<types><members>A</members><name>ApexClass</name><name>ApexPage</name></types>"),
        package("<types><name>ApexClass</name></types>"),
    ];

    for xml in cases {
        let manual = tree.write("manifest/package.xml", &xml).unwrap();
        let mut config = tree.config();
        config.mode = Mode::Check;
        config.sources.manifest = Some(manual);

        let err = Pipeline::new(config).run().await.unwrap_err();
        assert!(
            matches!(policy_error(&err), Some(SfpkgError::PolicyViolation { .. })),
            "{xml}: {err:#}"
        );
    }
}

/// ConnectedApp consumer keys are removed on deploy but not on destroy
#[tokio::test]
async fn test_connected_app_scrubbing() {
    let tree = SourceTree::new().unwrap();
    let app = tree.add_connected_app("Portal", Some("3MVG9secret")).unwrap();
    let manual = tree
        .write_manifest("manifest/package.xml", &[("ConnectedApp", &["Portal"])], None)
        .unwrap();

    let mut config = tree.config();
    config.stage = Stage::Destroy;
    config.sources.manifest = Some(manual);
    Pipeline::new(config.clone()).run().await.unwrap();
    assert!(std::fs::read_to_string(&app).unwrap().contains("3MVG9secret"));

    config.stage = Stage::Deploy;
    let outcome = Pipeline::new(config).run().await.unwrap();
    assert_eq!(outcome.report.scrubbed, vec![app.clone()]);
    let scrubbed = std::fs::read_to_string(&app).unwrap();
    assert!(scrubbed.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert!(!scrubbed.contains("consumerKey"));
    assert!(scrubbed.contains("<callbackUrl>https://example.com/callback</callbackUrl>"));
}

/// A declared ConnectedApp without a source file is fatal
#[tokio::test]
async fn test_connected_app_without_source_fails() {
    let tree = SourceTree::new().unwrap();
    let manual = tree
        .write_manifest("manifest/package.xml", &[("ConnectedApp", &["Missing"])], None)
        .unwrap();
    let mut config = tree.config();
    config.sources.manifest = Some(manual);

    let err = Pipeline::new(config).run().await.unwrap_err();
    assert!(matches!(policy_error(&err), Some(SfpkgError::SourceNotFound { .. })));
}
