//! Union of manifests from several sources.
//!
//! Two merge modes exist:
//!
//! - [`ManifestMerger::merge`] combines the change sources of one run (diff
//!   tool output, static manifest, message manifest). Member sets are
//!   unioned per type; the API version comes from the last source whose
//!   origin is trusted to declare one. Diff-tool output is not trusted
//!   unless the policy says so.
//! - [`ManifestMerger::combine_branches`] combines independent branches.
//!   Member sets are unioned the same way; the API version is the numeric
//!   maximum across branches, with a missing version counting as zero.
//!
//! Wildcards never reach the canonical manifest: a `*` member, or a type
//! name containing `*`, is dropped with a warning. A type whose only member
//! was `*` is left out entirely rather than kept as an empty block.

use tracing::{debug, warn};

use super::{ApiVersion, Manifest, ManifestOrigin};
use crate::config::PolicyConfig;
use crate::constants::WILDCARD_MEMBER;

/// A parsed manifest tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedManifest {
    /// Source of the manifest
    pub origin: ManifestOrigin,
    /// Parsed contents
    pub manifest: Manifest,
}

impl SourcedManifest {
    /// Tag a manifest with its origin.
    #[must_use]
    pub const fn new(origin: ManifestOrigin, manifest: Manifest) -> Self {
        Self {
            origin,
            manifest,
        }
    }
}

/// Merges manifests under an injected policy.
#[derive(Debug, Clone, Copy)]
pub struct ManifestMerger<'a> {
    policy: &'a PolicyConfig,
}

impl<'a> ManifestMerger<'a> {
    /// Create a merger for `policy`.
    #[must_use]
    pub const fn new(policy: &'a PolicyConfig) -> Self {
        Self {
            policy,
        }
    }

    /// Whether a manifest from `origin` may set the output version.
    #[must_use]
    pub const fn trusts_version(&self, origin: &ManifestOrigin) -> bool {
        match origin {
            ManifestOrigin::Diff => self.policy.trust_diff_version,
            ManifestOrigin::Static | ManifestOrigin::Message | ManifestOrigin::Branch(_) => true,
        }
    }

    /// Union change sources in order.
    ///
    /// The version of the last trusted source declaring one wins, so a
    /// message manifest listed after the static manifest overrides it.
    #[must_use]
    pub fn merge<I>(&self, sources: I) -> Manifest
    where
        I: IntoIterator<Item = SourcedManifest>,
    {
        let mut merged = Manifest::new();
        let mut version: Option<ApiVersion> = None;

        for source in sources {
            self.absorb(&mut merged, &source);
            match source.manifest.version() {
                Some(declared) if self.trusts_version(&source.origin) => {
                    debug!("Using API version {} from the {}", declared, source.origin);
                    version = Some(declared.clone());
                }
                Some(declared) => {
                    debug!("Ignoring API version {} from the {}", declared, source.origin);
                }
                None => {}
            }
        }

        merged.set_version(version);
        merged
    }

    /// Union independent branch manifests, keeping the highest API version.
    ///
    /// When no branch declares a version the output has none.
    #[must_use]
    pub fn combine_branches<I>(&self, branches: I) -> Manifest
    where
        I: IntoIterator<Item = SourcedManifest>,
    {
        let mut merged = Manifest::new();
        let mut version: Option<ApiVersion> = None;

        for branch in branches {
            self.absorb(&mut merged, &branch);
            if let Some(declared) = branch.manifest.version() {
                let higher =
                    version.as_ref().is_none_or(|current| declared.value() > current.value());
                if higher {
                    version = Some(declared.clone());
                }
            }
        }

        merged.set_version(version);
        merged
    }

    fn absorb(&self, target: &mut Manifest, source: &SourcedManifest) {
        for entry in source.manifest.entries() {
            if entry.type_name().contains(WILDCARD_MEMBER) {
                warn!(
                    "Wildcards are not allowed in the deployment package: \
                     dropping type '{}' from the {}",
                    entry.type_name(),
                    source.origin
                );
                continue;
            }

            if entry.has_wildcard() {
                warn!(
                    "Wildcards are not allowed in the deployment package: \
                     dropping '{}' member of '{}' from the {}",
                    WILDCARD_MEMBER,
                    entry.type_name(),
                    source.origin
                );
                if entry.len() == 1 {
                    warn!(
                        "Type '{}' from the {} only listed '{}', leaving it out",
                        entry.type_name(),
                        source.origin,
                        WILDCARD_MEMBER
                    );
                    continue;
                }
            }

            let merged_entry = target.entry_mut(entry.type_name());
            for member in entry.members().filter(|member| *member != WILDCARD_MEMBER) {
                merged_entry.insert(member);
            }
        }
    }
}
