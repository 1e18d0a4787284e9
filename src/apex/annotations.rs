//! Test class conventions in Apex source and in commit messages.
//!
//! Two conventions declare tests in source, and both apply to the same file:
//!
//! - an annotation line such as `// @tests: AccountTest, LeadTest` (or
//!   `@testsuites:`), keyword matched case-insensitively, names the tests
//!   that cover the file
//! - an `@isTest` annotation anywhere in a class marks the class itself as a
//!   test class
//!
//! Commit and merge-request messages can name extra tests between
//! `Apex::` and `::Apex` markers.

use regex::Regex;
use std::sync::OnceLock;

fn declared_tests_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)@(?:testsuites|tests)[ \t]*:[ \t]*([\w \t,]+)")
            .expect("declared tests pattern is valid")
    })
}

fn test_marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)@istest\b").expect("test marker pattern is valid"))
}

fn message_tests_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)apex::(.*?)::apex").expect("message tests pattern is valid")
    })
}

fn split_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(|c: char| c == ',' || c.is_whitespace()).filter(|name| !name.is_empty())
}

/// Test class candidates declared by one Apex source file.
///
/// `class_name` is the file's own class, added when the file carries
/// `@isTest`. Candidates come back in discovery order and may repeat.
///
/// ```rust
/// use sfpkg_cli::apex::annotations::extract_declared_tests;
///
/// let source = "// @tests: AccountTest, LeadTest\npublic class AccountHandler {}";
/// assert_eq!(extract_declared_tests(source, "AccountHandler"), vec!["AccountTest", "LeadTest"]);
///
/// let test = "@isTest\nprivate class AccountTest {}";
/// assert_eq!(extract_declared_tests(test, "AccountTest"), vec!["AccountTest"]);
/// ```
#[must_use]
pub fn extract_declared_tests(content: &str, class_name: &str) -> Vec<String> {
    let mut candidates: Vec<String> = declared_tests_pattern()
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .flat_map(|list| split_names(list.as_str()))
        .map(ToString::to_string)
        .collect();

    if test_marker_pattern().is_match(content) {
        candidates.push(class_name.to_string());
    }
    candidates
}

/// Test classes named in a commit or merge-request message.
///
/// Reads the first `Apex::...::Apex` block; names may be separated by
/// commas or whitespace. Returns an empty list when there is no block.
#[must_use]
pub fn extract_message_tests(message: &str) -> Vec<String> {
    message_tests_pattern()
        .captures(message)
        .and_then(|captures| captures.get(1))
        .map(|list| split_names(list.as_str()).map(ToString::to_string).collect())
        .unwrap_or_default()
}
