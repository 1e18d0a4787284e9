//! Core types shared by every stage of the manifest pipeline.
//!
//! - [`SfpkgError`] and [`ErrorContext`] - error taxonomy and user-facing reporting
//! - [`MetadataKind`] - classification of policy-significant metadata types
//! - [`ValidationContext`] - pipeline stage and target environment

mod context;
pub mod error;
mod metadata_kind;

pub use context::{EnvironmentClass, Stage, ValidationContext};
pub use error::{ErrorContext, SfpkgError, user_friendly_error};
pub use metadata_kind::MetadataKind;
