//! The verified set of test classes and its serialized forms.

use std::collections::BTreeSet;
use std::fmt;

use crate::constants::NO_TESTS_SENTINEL;
use crate::manifest::serializer::case_insensitive;

/// A set of Apex test class names.
///
/// Serialization is always sorted case-insensitively so that the persisted
/// list diffs cleanly between runs.
///
/// ```rust
/// use sfpkg_cli::apex::TestSelection;
///
/// let selection = TestSelection::parse_list("beta, Alpha,gamma\n");
/// assert_eq!(selection.to_file_string(), "Alpha,beta,gamma");
/// assert_eq!(selection.to_cli_string(), "Alpha beta gamma");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSelection {
    classes: BTreeSet<String>,
}

impl TestSelection {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a persisted test list. Commas and whitespace both separate names.
    #[must_use]
    pub fn parse_list(text: &str) -> Self {
        text.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Add a class name; returns `false` if it was already present.
    pub fn insert(&mut self, class: impl Into<String>) -> bool {
        self.classes.insert(class.into())
    }

    /// Whether `class` is in the selection.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the selection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class names in case-insensitive order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.classes.iter().map(String::as_str).collect();
        classes.sort_by(|a, b| case_insensitive(a, b));
        classes
    }

    /// Comma-delimited form written to the test list file.
    #[must_use]
    pub fn to_file_string(&self) -> String {
        self.sorted().join(",")
    }

    /// Space-delimited form handed to the deployment command.
    #[must_use]
    pub fn to_cli_string(&self) -> String {
        self.sorted().join(" ")
    }
}

impl<S: Into<String>> FromIterator<S> for TestSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            classes: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for TestSelection {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.classes.extend(iter.into_iter().map(Into::into));
    }
}

/// Tests that must accompany a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestRequirement {
    /// No tests run; the invoker receives the sentinel
    NotRequired,
    /// Run exactly these classes
    Run(TestSelection),
}

impl TestRequirement {
    /// Value printed for the deployment invoker to capture.
    #[must_use]
    pub fn to_cli_string(&self) -> String {
        match self {
            Self::NotRequired => NO_TESTS_SENTINEL.to_string(),
            Self::Run(selection) => selection.to_cli_string(),
        }
    }

    /// Content of the persisted test list file; empty when no tests run.
    #[must_use]
    pub fn to_file_string(&self) -> String {
        match self {
            Self::NotRequired => String::new(),
            Self::Run(selection) => selection.to_file_string(),
        }
    }

    /// The selection, if tests run.
    #[must_use]
    pub const fn selection(&self) -> Option<&TestSelection> {
        match self {
            Self::NotRequired => None,
            Self::Run(selection) => Some(selection),
        }
    }
}

impl fmt::Display for TestRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cli_string())
    }
}
