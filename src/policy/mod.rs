//! Organizational policy over a merged manifest.
//!
//! [`PolicyValidator`] runs one linear pass over the manifest. Every check
//! is terminal; the first failure is returned and nothing after it runs.
//!
//! 1. the manifest has at least one type block
//! 2. no `*` member survives (or, under `wildcard = "warn"`, it is stripped)
//! 3. every type block has at least one member
//! 4. no banned umbrella type appears
//! 5. ConnectedApp consumer keys are scrubbed from source (skipped on destroy)
//! 6. the manifest is flagged when it carries Apex
//!
//! Document-level schema checks (root identity, namespace, name and version
//! cardinality) run first when validating a raw [`PackageDocument`] through
//! [`PolicyValidator::validate_document`].

pub mod connected_app;

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{PolicyConfig, WildcardPolicy};
use crate::constants::WILDCARD_MEMBER;
use crate::core::{MetadataKind, SfpkgError, ValidationContext};
use crate::manifest::Manifest;
use crate::manifest::parser::PackageDocument;
use crate::manifest::serializer::case_insensitive;
use crate::project::PackageDirectorySet;

/// Outcome of a successful validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Whether any Apex class or trigger is deployed
    pub apex_required: bool,
    /// Number of type blocks validated
    pub types: usize,
    /// Total member count across all blocks
    pub members: usize,
    /// ConnectedApp files whose consumer key was removed
    pub scrubbed: Vec<PathBuf>,
    /// Non-fatal findings, in the order they were raised
    pub warnings: Vec<String>,
}

/// Validates manifests against an injected policy.
#[derive(Debug, Clone, Copy)]
pub struct PolicyValidator<'a> {
    policy: &'a PolicyConfig,
    directories: &'a PackageDirectorySet,
}

impl<'a> PolicyValidator<'a> {
    /// Create a validator; ConnectedApp sources are looked up in `directories`.
    #[must_use]
    pub const fn new(policy: &'a PolicyConfig, directories: &'a PackageDirectorySet) -> Self {
        Self {
            policy,
            directories,
        }
    }

    /// Schema-check a raw document, then validate the manifest it describes.
    ///
    /// # Errors
    ///
    /// Returns the first schema or policy failure.
    pub fn validate_document(
        &self,
        document: PackageDocument,
        ctx: ValidationContext,
    ) -> Result<(Manifest, ValidationReport), SfpkgError> {
        document.check_schema(self.policy)?;
        let mut manifest = document.into_manifest();
        let report = self.validate(&mut manifest, ctx)?;
        Ok((manifest, report))
    }

    /// Validate a merged manifest.
    ///
    /// Member sets may be mutated (wildcards stripped under the warn policy);
    /// type identity never is.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::PolicyViolation`] for an empty manifest, an
    /// empty or wildcard member list, or a banned type.
    /// ConnectedApp scrubbing returns [`SfpkgError::SourceNotFound`] for a
    /// member without a source file and file errors from the rewrite.
    pub fn validate(
        &self,
        manifest: &mut Manifest,
        ctx: ValidationContext,
    ) -> Result<ValidationReport, SfpkgError> {
        let mut report = ValidationReport::default();

        if manifest.is_empty() {
            return Err(SfpkgError::PolicyViolation {
                reason: "Package.xml is empty, no <types> declared".to_string(),
            });
        }

        self.check_members(manifest, &mut report)?;
        self.check_banned_types(manifest)?;

        if ctx.is_destructive() {
            info!("Skipping ConnectedApp scrubbing for a destructive deployment");
        } else {
            report.scrubbed = self.scrub_connected_apps(manifest)?;
        }

        report.apex_required = manifest.requires_apex_tests();
        report.types = manifest.len();
        report.members = manifest.entries().map(|entry| entry.len()).sum();

        log_contents(manifest);
        if report.apex_required {
            info!("Apex tests are required for this deployment");
        } else {
            info!("Apex tests are not required for this deployment");
        }
        Ok(report)
    }

    fn check_members(
        &self,
        manifest: &mut Manifest,
        report: &mut ValidationReport,
    ) -> Result<(), SfpkgError> {
        for entry in manifest.entries_mut() {
            if entry.has_wildcard() {
                match self.policy.wildcard {
                    WildcardPolicy::Error => {
                        return Err(SfpkgError::PolicyViolation {
                            reason: format!(
                                "Wildcard member '{WILDCARD_MEMBER}' is not allowed for type '{}'",
                                entry.type_name()
                            ),
                        });
                    }
                    WildcardPolicy::Warn => {
                        entry.remove(WILDCARD_MEMBER);
                        let message = format!(
                            "Dropped wildcard member '{WILDCARD_MEMBER}' from type '{}'",
                            entry.type_name()
                        );
                        warn!("{message}");
                        report.warnings.push(message);
                    }
                }
            }

            if entry.is_empty() {
                return Err(SfpkgError::PolicyViolation {
                    reason: format!("Members list is missing for type '{}'", entry.type_name()),
                });
            }
        }
        Ok(())
    }

    fn check_banned_types(&self, manifest: &Manifest) -> Result<(), SfpkgError> {
        for entry in manifest.entries() {
            if let Some(banned) = self.policy.banned(entry.type_name()) {
                let guidance = if banned.alternatives.is_empty() {
                    String::new()
                } else {
                    format!(", use one of these instead: {}", banned.alternatives.join(", "))
                };
                return Err(SfpkgError::PolicyViolation {
                    reason: format!("Type '{}' is not allowed{guidance}", entry.type_name()),
                });
            }
        }
        Ok(())
    }

    fn scrub_connected_apps(&self, manifest: &Manifest) -> Result<Vec<PathBuf>, SfpkgError> {
        let mut scrubbed = Vec::new();
        for entry in manifest.entries_of(MetadataKind::ConnectedApp) {
            for member in entry.members() {
                let found = self.directories.find_member_file(MetadataKind::ConnectedApp, member);
                let Some(path) = found else {
                    return Err(SfpkgError::SourceNotFound {
                        kind: MetadataKind::ConnectedApp.to_string(),
                        member: member.to_string(),
                        file_name: PackageDirectorySet::member_file_name(
                            MetadataKind::ConnectedApp,
                            member,
                        )
                        .unwrap_or_default(),
                    });
                };
                if connected_app::scrub_consumer_key(&path)? {
                    scrubbed.push(path);
                }
            }
        }
        Ok(scrubbed)
    }
}

fn log_contents(manifest: &Manifest) {
    info!("Deployment package contents:");
    let mut entries: Vec<_> = manifest.entries().collect();
    entries.sort_by(|a, b| case_insensitive(a.type_name(), b.type_name()));
    for entry in entries {
        let mut members: Vec<&str> = entry.members().collect();
        members.sort_by(|a, b| case_insensitive(a, b));
        info!("  {}: {}", entry.type_name(), members.join(", "));
    }
}
