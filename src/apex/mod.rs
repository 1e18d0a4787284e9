//! Test requirement resolution for Apex deployments.
//!
//! A deployment that carries Apex classes or triggers must name the test
//! classes to run. [`TestResolver`] derives them from source:
//!
//! 1. every Apex member is resolved to its `.cls` / `.trigger` file under the
//!    package directories (a missing file is fatal)
//! 2. each file is scanned for `@tests:` annotations and the `@isTest`
//!    marker (see [`annotations`])
//! 3. every candidate is checked against the `.cls` files that exist; unknown
//!    names are dropped with a warning
//! 4. an empty result is fatal
//!
//! Steps 1 and 2 run as one task per member on a bounded pool. Tasks only
//! share the candidate set, and set union does not depend on completion
//! order, so the result is the same for any pool size.

pub mod annotations;
mod selection;

pub use selection::{TestRequirement, TestSelection};

use dashmap::DashSet;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::SIMILAR_NAME_THRESHOLD;
use crate::core::{MetadataKind, SfpkgError};
use crate::manifest::Manifest;
use crate::project::PackageDirectorySet;

/// Derives and verifies the test classes for a manifest.
#[derive(Debug, Clone)]
pub struct TestResolver {
    directories: Arc<PackageDirectorySet>,
    concurrency: usize,
}

impl TestResolver {
    /// Create a resolver running at most `concurrency` scans at once.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(directories: Arc<PackageDirectorySet>, concurrency: usize) -> Self {
        Self {
            directories,
            concurrency: concurrency.max(1),
        }
    }

    /// Worker pool size in effect.
    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Resolve the verified test selection for `manifest`.
    ///
    /// `extra_candidates` (for example tests named in the commit message) go
    /// through the same verification as the candidates found in source.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::SourceNotFound`] for an Apex member without a
    /// source file, and [`SfpkgError::NoValidTests`] when no candidate
    /// survives verification.
    pub async fn resolve(
        &self,
        manifest: &Manifest,
        extra_candidates: &[String],
    ) -> Result<TestSelection, SfpkgError> {
        let mut candidates = self.collect_candidates(manifest).await?;
        candidates.extend(extra_candidates.iter().cloned());
        self.verify(candidates).await
    }

    /// Scan the source of every Apex member for test class candidates.
    ///
    /// All scans run to completion; if any failed, the error of the first
    /// failing member (in manifest order) is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::SourceNotFound`] for a member without a source
    /// file, or a file system error if a source cannot be read.
    pub async fn collect_candidates(
        &self,
        manifest: &Manifest,
    ) -> Result<BTreeSet<String>, SfpkgError> {
        let members: Vec<(MetadataKind, String)> = manifest
            .entries()
            .filter(|entry| entry.kind().requires_tests())
            .flat_map(|entry| {
                let kind = entry.kind();
                entry.members().map(move |member| (kind, member.to_string()))
            })
            .collect();
        debug!(
            "Scanning {} Apex member(s) with up to {} concurrent task(s)",
            members.len(),
            self.concurrency
        );

        let candidates = Arc::new(DashSet::new());
        let results: Vec<(usize, Result<(), SfpkgError>)> =
            stream::iter(members.into_iter().enumerate())
            .map(|(index, (kind, member))| {
                let directories = Arc::clone(&self.directories);
                let candidates = Arc::clone(&candidates);
                async move {
                    let scanned = tokio::task::spawn_blocking(move || {
                        scan_member(&directories, kind, &member)
                    })
                    .await
                    .map_err(|e| SfpkgError::Other {
                        message: format!("Test resolver task failed: {e}"),
                    })
                    .and_then(|result| result);

                    let outcome = scanned.map(|found| {
                        for candidate in found {
                            candidates.insert(candidate);
                        }
                    });
                    (index, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        if let Some((_, Err(error))) = results
            .into_iter()
            .filter(|(_, outcome)| outcome.is_err())
            .min_by_key(|(index, _)| *index)
        {
            return Err(error);
        }

        Ok(candidates.iter().map(|candidate| candidate.key().clone()).collect())
    }

    /// Keep the candidates that exist as `.cls` files.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::NoValidTests`] when nothing survives.
    pub async fn verify<I>(&self, candidates: I) -> Result<TestSelection, SfpkgError>
    where
        I: IntoIterator<Item = String>,
    {
        let directories = Arc::clone(&self.directories);
        let known = tokio::task::spawn_blocking(move || directories.apex_class_names())
            .await
            .map_err(|e| SfpkgError::Other {
                message: format!("Apex class index task failed: {e}"),
            })?;
        verify_against(candidates, &known)
    }
}

fn scan_member(
    directories: &PackageDirectorySet,
    kind: MetadataKind,
    member: &str,
) -> Result<Vec<String>, SfpkgError> {
    let Some(path) = directories.find_member_file(kind, member) else {
        return Err(SfpkgError::SourceNotFound {
            kind: kind.to_string(),
            member: member.to_string(),
            file_name: PackageDirectorySet::member_file_name(kind, member).unwrap_or_default(),
        });
    };

    let bytes = std::fs::read(&path).map_err(|e| SfpkgError::FileSystemError {
        operation: format!("read Apex source: {e}"),
        path: path.display().to_string(),
    })?;
    let content = String::from_utf8_lossy(&bytes);

    let found = annotations::extract_declared_tests(&content, member);
    if found.is_empty() {
        warn!("No test annotations found in {} ({kind} {member})", path.display());
    } else {
        debug!("{kind} {member} declares tests: {}", found.join(", "));
    }
    Ok(found)
}

/// Split candidates into verified classes and dropped names.
///
/// # Errors
///
/// Returns [`SfpkgError::NoValidTests`] when no candidate is in `known`.
pub fn verify_against<I>(
    candidates: I,
    known: &HashSet<String>,
) -> Result<TestSelection, SfpkgError>
where
    I: IntoIterator<Item = String>,
{
    let unique: BTreeSet<String> = candidates.into_iter().collect();
    let mut selection = TestSelection::new();
    let mut dropped = Vec::new();

    for candidate in unique {
        if known.contains(&candidate) {
            selection.insert(candidate);
            continue;
        }
        match closest_class(&candidate, known) {
            Some(hint) => warn!(
                "{candidate} is not a valid test class in any package directory, \
                 did you mean '{hint}'?"
            ),
            None => warn!("{candidate} is not a valid test class in any package directory"),
        }
        dropped.push(candidate);
    }

    if selection.is_empty() {
        return Err(SfpkgError::NoValidTests {
            dropped,
        });
    }
    info!("Verified test classes: {}", selection.to_cli_string());
    Ok(selection)
}

fn closest_class<'a>(candidate: &str, known: &'a HashSet<String>) -> Option<&'a str> {
    known
        .iter()
        .map(|class| (class, strsim::jaro_winkler(candidate, class)))
        .filter(|(_, score)| *score >= SIMILAR_NAME_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(class, _)| class.as_str())
}
