//! Error handling for sfpkg
//!
//! This module provides the error taxonomy of the manifest pipeline and the
//! user-friendly reporting layer used by the binary. The error system follows
//! two principles:
//! 1. **Strongly-typed errors** for precise handling in library code
//! 2. **Actionable messages** naming the offending type, member, or tag
//!
//! # Architecture
//!
//! - [`SfpkgError`] - Enumerated error types for every fatal condition
//! - [`ErrorContext`] - Wrapper adding details and a suggestion for CLI display
//!
//! # Error Categories
//!
//! - **Manifest documents**: [`SfpkgError::MalformedManifest`], [`SfpkgError::SchemaViolation`]
//! - **Organizational policy**: [`SfpkgError::PolicyViolation`]
//! - **Source lookup**: [`SfpkgError::SourceNotFound`], [`SfpkgError::MalformedMetadataFile`]
//! - **Test selection**: [`SfpkgError::NoValidTests`]
//! - **Ambient**: configuration, project descriptor, and file system failures
//!
//! Every variant is terminal. Nothing in the pipeline retries: a broken
//! manifest or a missing file needs a new commit, not another attempt.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sfpkg_cli::core::{SfpkgError, user_friendly_error};
//!
//! let error = SfpkgError::PolicyViolation {
//!     reason: "Wildcard member '*' is not allowed for type 'ApexClass'".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Prints colored error with a suggestion to stderr
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for sfpkg operations.
///
/// Each variant maps to one fatal condition of the manifest pipeline. The
/// message of each variant is written for the person who has to push the
/// fixing commit.
#[derive(Error, Debug, Clone)]
pub enum SfpkgError {
    /// The manifest document is not well-formed XML
    #[error("Unable to parse manifest from {origin}: {reason}")]
    MalformedManifest {
        /// Where the document came from (file path or source label)
        origin: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Wrong root element, wrong namespace, or an unexpected child element
    #[error("Manifest schema violation: {reason}")]
    SchemaViolation {
        /// What part of the schema was violated
        reason: String,
    },

    /// Cardinality, wildcard, banned-type, or empty-manifest violation
    #[error("Manifest policy violation: {reason}")]
    PolicyViolation {
        /// The policy rule that failed, naming the offending type or member
        reason: String,
    },

    /// A manifest member has no corresponding source file
    #[error("{kind} source file '{file_name}' not found for member '{member}'")]
    SourceNotFound {
        /// Metadata type of the member (e.g. `ApexClass`)
        kind: String,
        /// Member name from the manifest
        member: String,
        /// File name that was searched for
        file_name: String,
    },

    /// A metadata source file referenced by the manifest is not well-formed XML
    #[error("Unable to parse metadata file {path}: {reason}")]
    MalformedMetadataFile {
        /// Path to the source file
        path: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Apex is being deployed but no declared test class exists
    #[error("None of the declared test classes are valid test classes")]
    NoValidTests {
        /// Candidates that were declared but could not be verified
        dropped: Vec<String>,
    },

    /// Invalid pipeline configuration
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// The project descriptor could not be read or understood
    #[error("Invalid project file {path}: {reason}")]
    ProjectFileError {
        /// Path to the project descriptor
        path: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// A file system operation failed
    #[error("File system error: {operation} ({path})")]
    FileSystemError {
        /// The operation that failed
        operation: String,
        /// The path involved
        path: String,
    },

    /// Anything else, with a free-form message
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// An error together with user-facing details and a suggested fix.
///
/// ```rust,no_run
/// use sfpkg_cli::core::{SfpkgError, ErrorContext};
///
/// let context = ErrorContext::new(SfpkgError::NoValidTests { dropped: vec![] })
///     .with_suggestion("Add an @tests: annotation naming an existing test class")
///     .with_details("Apex deployments must run at least one test class");
///
/// println!("{}", context);
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SfpkgError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: SfpkgError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with an actionable suggestion.
///
/// Recognizes [`SfpkgError`] anywhere in the `anyhow` chain, then
/// [`std::io::Error`] and [`toml::de::Error`]; everything else is reported
/// with its full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(sfpkg_error) = cause.downcast_ref::<SfpkgError>() {
            let ctx = create_error_context(sfpkg_error.clone());
            return attach_chain(ctx, &error);
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let ctx = ErrorContext::new(SfpkgError::Other {
            message: error.to_string(),
        });
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ctx
                .with_suggestion("Check file ownership and permissions in the CI workspace"),
            std::io::ErrorKind::NotFound => ctx.with_suggestion(
                "Check that the file or directory exists and the path is correct",
            ),
            _ => ctx,
        };
    }

    for cause in error.chain() {
        if let Some(toml_error) = cause.downcast_ref::<toml::de::Error>() {
            return ErrorContext::new(SfpkgError::ConfigError {
                message: toml_error.to_string(),
            })
            .with_suggestion("Check the TOML syntax in sfpkg.toml")
            .with_details(format!("{error:#}"));
        }
    }

    ErrorContext::new(SfpkgError::Other {
        message: format!("{error:#}"),
    })
}

/// Keep the outer `anyhow` context (e.g. which file was being processed) as details.
fn attach_chain(ctx: ErrorContext, error: &anyhow::Error) -> ErrorContext {
    let outer: Vec<String> = error
        .chain()
        .take_while(|cause| cause.downcast_ref::<SfpkgError>().is_none())
        .map(ToString::to_string)
        .collect();
    if outer.is_empty() || ctx.details.is_some() {
        ctx
    } else {
        ctx.with_details(outer.join(": "))
    }
}

fn create_error_context(error: SfpkgError) -> ErrorContext {
    match &error {
        SfpkgError::MalformedManifest {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Fix the package.xml formatting and push a new commit"),
        SfpkgError::SchemaViolation {
            ..
        } => ErrorContext::new(error).with_suggestion(format!(
            "The root must be <{}> in namespace '{}' and contain only <{}> and <{}> elements",
            crate::constants::PACKAGE_ROOT,
            crate::constants::METADATA_NAMESPACE,
            crate::constants::TYPES_ELEMENT,
            crate::constants::VERSION_ELEMENT,
        )),
        SfpkgError::PolicyViolation {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Update the package.xml and push a new commit"),
        SfpkgError::SourceNotFound {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Check the member name in the package.xml and that the file is committed \
             under a package directory",
        ),
        SfpkgError::MalformedMetadataFile {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Fix the XML in the source file and push a new commit"),
        SfpkgError::NoValidTests {
            dropped,
        } => {
            let details = if dropped.is_empty() {
                "No @tests/@testsuites annotation or @isTest class was found".to_string()
            } else {
                format!("Declared but not found: {}", dropped.join(", "))
            };
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Confirm the test class annotations and try again")
        }
        SfpkgError::ConfigError {
            ..
        } => ErrorContext::new(error).with_suggestion("Check sfpkg.toml and the SFPKG_* variables"),
        SfpkgError::ProjectFileError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("sfdx-project.json must list at least one packageDirectories path"),
        _ => ErrorContext::new(error),
    }
}
