//! Deployment manifest model, parsing, merging, and serialization.
//!
//! A manifest (`package.xml`) names the metadata a deployment touches:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8" standalone="yes"?>
//! <Package xmlns="http://soap.sforce.com/2006/04/metadata">
//!     <types>
//!         <members>AccountHandler</members>
//!         <name>ApexClass</name>
//!     </types>
//!     <version>60.0</version>
//! </Package>
//! ```
//!
//! # Modules
//!
//! - [`parser`] - XML document to [`Manifest`], with schema checks
//! - [`merge`] - union of manifests from several sources
//! - [`serializer`] - canonical, sorted rendering back to XML
//! - [`embedded`] - manifest blocks embedded in commit messages
//!
//! # Example
//!
//! ```rust
//! use sfpkg_cli::config::PolicyConfig;
//! use sfpkg_cli::manifest::{parser, serializer};
//!
//! # fn example() -> Result<(), sfpkg_cli::core::SfpkgError> {
//! let xml = r#"<Package xmlns="http://soap.sforce.com/2006/04/metadata">
//!     <types><members>B</members><members>a</members><name>ApexClass</name></types>
//! </Package>"#;
//! let manifest = parser::parse_manifest(xml, "inline", &PolicyConfig::default())?;
//! assert_eq!(manifest.get("ApexClass").unwrap().len(), 2);
//! let rendered = serializer::render(&manifest);
//! assert!(rendered.find("<members>a</members>") < rendered.find("<members>B</members>"));
//! # Ok(())
//! # }
//! ```

pub mod embedded;
pub mod merge;
pub mod parser;
pub mod serializer;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::constants::WILDCARD_MEMBER;
use crate::core::MetadataKind;

/// One `<types>` block: a type name and its members.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataEntry {
    type_name: String,
    members: BTreeSet<String>,
}

impl MetadataEntry {
    /// Create an empty entry for `type_name`, keeping its spelling.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: BTreeSet::new(),
        }
    }

    /// Type name as written in the source manifest.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Policy classification of the type.
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        MetadataKind::classify(&self.type_name)
    }

    /// Members in byte order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the entry has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `member` is present.
    #[must_use]
    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// Whether the wildcard member is present.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.members.contains(WILDCARD_MEMBER)
    }

    /// Add a member; returns `false` if it was already present.
    pub fn insert(&mut self, member: impl Into<String>) -> bool {
        self.members.insert(member.into())
    }

    /// Remove a member; returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        self.members.remove(member)
    }
}

/// A Metadata API version such as `60.0`.
///
/// Kept as the declared string for output; compared numerically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersion(String);

impl ApiVersion {
    /// Wrap a declared version, returning `None` if it is not a decimal number.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|_| Self(raw.to_string()))
    }

    /// The version as declared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value for comparisons.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0.parse().unwrap_or(0.0)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a manifest document came from.
///
/// The origin decides whether the document's `<version>` is trusted and
/// whether a parse failure aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestOrigin {
    /// Output of the structural diff tool
    Diff,
    /// Hand-maintained manifest in the repository
    Static,
    /// Manifest block embedded in a commit or merge-request message
    Message,
    /// One branch in combine mode
    Branch(String),
}

impl ManifestOrigin {
    /// A required source aborts the run when it cannot be parsed.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self, Self::Diff | Self::Static)
    }
}

impl fmt::Display for ManifestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diff => write!(f, "diff-tool manifest"),
            Self::Static => write!(f, "static manifest"),
            Self::Message => write!(f, "message manifest"),
            Self::Branch(name) => write!(f, "branch '{name}'"),
        }
    }
}

/// Type name to entry mapping plus an optional API version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    entries: BTreeMap<String, MetadataEntry>,
    version: Option<ApiVersion>,
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `type_name`, created if absent.
    pub fn entry_mut(&mut self, type_name: &str) -> &mut MetadataEntry {
        self.entries
            .entry(type_name.to_string())
            .or_insert_with(|| MetadataEntry::new(type_name))
    }

    /// Add one member to a type.
    pub fn add_member(&mut self, type_name: &str, member: impl Into<String>) -> bool {
        self.entry_mut(type_name).insert(member)
    }

    /// Entry for an exact type name.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&MetadataEntry> {
        self.entries.get(type_name)
    }

    /// All entries, ordered by type name bytes.
    pub fn entries(&self) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values()
    }

    /// Mutable access to all entries. Type names cannot change through this.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut MetadataEntry> {
        self.entries.values_mut()
    }

    /// Entries whose type classifies as `kind`.
    pub fn entries_of(&self, kind: MetadataKind) -> impl Iterator<Item = &MetadataEntry> {
        self.entries.values().filter(move |entry| entry.kind() == kind)
    }

    /// Number of type blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no type blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared or resolved API version.
    #[must_use]
    pub fn version(&self) -> Option<&ApiVersion> {
        self.version.as_ref()
    }

    /// Set the API version.
    pub fn set_version(&mut self, version: Option<ApiVersion>) {
        self.version = version;
    }

    /// Whether any entry is an Apex class or trigger.
    #[must_use]
    pub fn requires_apex_tests(&self) -> bool {
        self.entries.values().any(|entry| entry.kind().requires_tests())
    }
}
