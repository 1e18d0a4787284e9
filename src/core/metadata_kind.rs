//! Policy-significant metadata types.
//!
//! Manifests name metadata types as free strings. The handful of types that
//! the pipeline treats specially are classified once into [`MetadataKind`] so
//! policy code matches on variants instead of comparing lower-cased strings.
//!
//! Classification is case-insensitive; the original spelling is kept on the
//! manifest entry for output.
//!
//! ```rust
//! use sfpkg_cli::core::MetadataKind;
//!
//! assert_eq!(MetadataKind::classify("ApexClass"), MetadataKind::ApexClass);
//! assert_eq!(MetadataKind::classify("apextrigger"), MetadataKind::ApexTrigger);
//! assert_eq!(MetadataKind::classify("CustomObject"), MetadataKind::Opaque);
//! assert!(MetadataKind::ApexClass.requires_tests());
//! ```

use std::fmt;

/// Classification of a manifest type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKind {
    /// Apex classes, stored as `<name>.cls`
    ApexClass,
    /// Apex triggers, stored as `<name>.trigger`
    ApexTrigger,
    /// Connected apps, stored as `<name>.connectedApp-meta.xml`
    ConnectedApp,
    /// The `Workflow` umbrella type
    Workflow,
    /// Any type without special handling
    Opaque,
}

impl MetadataKind {
    /// Classify a type name, ignoring case.
    #[must_use]
    pub fn classify(type_name: &str) -> Self {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "apexclass" => Self::ApexClass,
            "apextrigger" => Self::ApexTrigger,
            "connectedapp" => Self::ConnectedApp,
            "workflow" => Self::Workflow,
            _ => Self::Opaque,
        }
    }

    /// Whether deploying this type requires Apex tests.
    #[must_use]
    pub const fn requires_tests(self) -> bool {
        matches!(self, Self::ApexClass | Self::ApexTrigger)
    }

    /// File suffix of the source artifact for a member of this type.
    #[must_use]
    pub const fn source_suffix(self) -> Option<&'static str> {
        match self {
            Self::ApexClass => Some(".cls"),
            Self::ApexTrigger => Some(".trigger"),
            Self::ConnectedApp => Some(".connectedApp-meta.xml"),
            Self::Workflow | Self::Opaque => None,
        }
    }

    /// Folder holding this type under the conventional `main/default` layout.
    #[must_use]
    pub const fn conventional_folder(self) -> Option<&'static str> {
        match self {
            Self::ApexClass => Some("classes"),
            Self::ApexTrigger => Some("triggers"),
            Self::ConnectedApp => Some("connectedApps"),
            Self::Workflow | Self::Opaque => None,
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApexClass => write!(f, "ApexClass"),
            Self::ApexTrigger => write!(f, "ApexTrigger"),
            Self::ConnectedApp => write!(f, "ConnectedApp"),
            Self::Workflow => write!(f, "Workflow"),
            Self::Opaque => write!(f, "metadata"),
        }
    }
}
