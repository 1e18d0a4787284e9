//! Constants used throughout the sfpkg codebase.
//!
//! This module holds the fixed literals of the Salesforce manifest format
//! and the defaults for the injectable policy parameters. Policy code never
//! reads these directly: they seed [`crate::config::PolicyConfig`], which is
//! passed to each component at construction.

/// Metadata API namespace every manifest root must be bound to.
pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Local name of the manifest root element.
pub const PACKAGE_ROOT: &str = "Package";

/// Child element holding one metadata type block.
pub const TYPES_ELEMENT: &str = "types";

/// Child element holding the manifest API version.
pub const VERSION_ELEMENT: &str = "version";

/// Element inside a type block naming the metadata type.
pub const NAME_ELEMENT: &str = "name";

/// Element inside a type block naming one member.
pub const MEMBERS_ELEMENT: &str = "members";

/// Member literal that selects every component of a type.
pub const WILDCARD_MEMBER: &str = "*";

/// XML declaration written at the top of every generated manifest.
pub const MANIFEST_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// XML declaration written back into scrubbed ConnectedApp files.
pub const METADATA_FILE_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Printed instead of a test list when no tests are required.
///
/// The deployment invoker compares against this literal, so it must not change.
pub const NO_TESTS_SENTINEL: &str = "not a test";

/// Sensitive ConnectedApp element removed before deployment.
pub const CONSUMER_KEY_ELEMENT: &str = "consumerKey";

/// Umbrella type banned by default, with the child types to use instead.
pub const DEFAULT_BANNED_TYPE: &str = "Workflow";

/// Child types that replace the banned `Workflow` umbrella type.
pub const WORKFLOW_CHILD_TYPES: &[&str] = &[
    "WorkflowAlert",
    "WorkflowFieldUpdate",
    "WorkflowFlowAction",
    "WorkflowKnowledgePublish",
    "WorkflowOutboundMessage",
    "WorkflowRule",
    "WorkflowSend",
    "WorkflowTask",
];

/// Default project descriptor listing package directories.
pub const DEFAULT_PROJECT_FILE: &str = "sfdx-project.json";

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sfpkg.toml";

/// Conventional source directory below a package directory root.
pub const CONVENTIONAL_SOURCE_DIR: &str = "main/default";

/// Multiplier applied to CPU core count for the resolver worker pool.
///
/// Resolver tasks are I/O-bound (directory walks and file reads), so the
/// pool is wider than the core count.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
///
/// Used as a fallback when `std::thread::available_parallelism()` returns an error.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Minimum Jaro-Winkler similarity for a "did you mean" hint on a dropped test class.
pub const SIMILAR_NAME_THRESHOLD: f64 = 0.85;

/// Default worker pool size for the test resolver.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_CORE_COUNT)
        * PARALLELISM_CORE_MULTIPLIER
}
