//! One pipeline run: sources to canonical manifest and test list.
//!
//! ```text
//! diff / static / message ──parse──► merge ──► validate ──► resolve tests
//!                                                              │            │
//!                                                              ▼            ▼
//!                                                         package.xml  runTests.txt
//! ```
//!
//! The mode decides where the manifest comes from:
//!
//! - [`Mode::Assemble`] parses the configured change sources and merges them
//! - [`Mode::Combine`] unions independent branch manifests and their test lists
//! - [`Mode::Check`] validates the static manifest as it is
//!
//! Parsing, merging and validation are sequential. Only test resolution
//! fans out, inside [`TestResolver`].

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::apex::annotations::extract_message_tests;
use crate::apex::{TestRequirement, TestResolver, TestSelection};
use crate::config::{Mode, PipelineConfig};
use crate::core::{EnvironmentClass, ValidationContext};
use crate::manifest::embedded::extract_embedded_manifest;
use crate::manifest::merge::{ManifestMerger, SourcedManifest};
use crate::manifest::parser::{parse_document, parse_source};
use crate::manifest::{ApiVersion, Manifest, ManifestOrigin, serializer};
use crate::policy::{PolicyValidator, ValidationReport};
use crate::project::{PackageDirectorySet, SfdxProject};
use crate::utils::fs::safe_write;

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Validated canonical manifest
    pub manifest: Manifest,
    /// Manifest as written to the output file
    pub rendered: String,
    /// Findings of the validation pass
    pub report: ValidationReport,
    /// Tests the deployment must run
    pub tests: TestRequirement,
}

/// Manifest sources gathered before validation.
struct Gathered {
    manifest: Manifest,
    test_candidates: Vec<String>,
}

/// Runs the manifest pipeline for one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline for `config`.
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self {
            config,
        }
    }

    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline and write its artifacts.
    ///
    /// # Errors
    ///
    /// Returns the first fatal condition: an unreadable or malformed required
    /// manifest, a schema or policy violation, a missing source file, no
    /// verifiable test class, or a failed write.
    pub async fn run(&self) -> Result<PipelineOutcome> {
        let ctx = self.config.validation_context();
        info!("Running {:?} mode for the {} stage", self.config.mode, ctx.stage);

        let (directories, project) = self.load_directories()?;
        let directories = Arc::new(directories);
        let policy = &self.config.policy;
        let validator = PolicyValidator::new(policy, &directories);

        let (mut manifest, report, test_candidates) = match self.config.mode {
            Mode::Check => {
                let path = self
                    .config
                    .sources
                    .manifest
                    .as_deref()
                    .context("check mode needs sources.manifest")?;
                let text = read_source(path).await?;
                let document = parse_document(&text, &path.display().to_string())?;
                let (manifest, report) = validator
                    .validate_document(document, ctx)
                    .with_context(|| format!("Manifest {} failed validation", path.display()))?;
                (manifest, report, Vec::new())
            }
            Mode::Assemble | Mode::Combine => {
                let Gathered {
                    mut manifest,
                    test_candidates,
                } = if self.config.mode == Mode::Combine {
                    self.combine().await?
                } else {
                    self.assemble().await?
                };
                let report = validator.validate(&mut manifest, ctx)?;
                (manifest, report, test_candidates)
            }
        };

        if manifest.version().is_none() && policy.project_version_fallback {
            let fallback = project
                .as_ref()
                .and_then(SfdxProject::source_api_version)
                .and_then(ApiVersion::parse);
            if let Some(version) = fallback {
                info!("Using the project's sourceApiVersion {version}");
                manifest.set_version(Some(version));
            }
        }

        let tests = self
            .test_requirement(&manifest, &report, ctx, test_candidates, directories)
            .await?;

        let rendered = serializer::render_with_namespace(&manifest, &policy.namespace);
        self.write_outputs(&rendered, &tests)?;

        Ok(PipelineOutcome {
            manifest,
            rendered,
            report,
            tests,
        })
    }

    /// Package directories from config, or from the project descriptor.
    ///
    /// The descriptor is also loaded, when present, for its API version.
    fn load_directories(&self) -> Result<(PackageDirectorySet, Option<SfdxProject>)> {
        let project_file = &self.config.project_file;
        let project = if self.config.package_directories.is_empty() || project_file.is_file() {
            Some(SfdxProject::load(project_file).with_context(|| {
                format!("Failed to load package directories from {}", project_file.display())
            })?)
        } else {
            None
        };

        let roots: Vec<PathBuf> = if self.config.package_directories.is_empty() {
            project.as_ref().map(|p| p.package_directories().to_vec()).unwrap_or_default()
        } else {
            self.config.package_directories.clone()
        };
        debug!("Package directories: {:?}", roots);

        let directories = PackageDirectorySet::new(roots, self.config.search)?;
        Ok((directories, project))
    }

    async fn assemble(&self) -> Result<Gathered> {
        let policy = &self.config.policy;
        let sources = &self.config.sources;
        let mut parsed = Vec::new();

        for (origin, path) in [
            (ManifestOrigin::Diff, sources.diff.as_deref()),
            (ManifestOrigin::Static, sources.manifest.as_deref()),
        ] {
            let Some(path) = path else {
                continue;
            };
            let text = read_source(path).await?;
            let manifest = parse_source(&text, &origin, policy)
                .with_context(|| format!("Failed to load the {origin} from {}", path.display()))?;
            if let Some(manifest) = manifest {
                parsed.push(SourcedManifest::new(origin, manifest));
            }
        }

        let mut test_candidates = Vec::new();
        if let Some(message) = &sources.message {
            if let Some(block) = extract_embedded_manifest(message) {
                let origin = ManifestOrigin::Message;
                if let Some(manifest) = parse_source(block, &origin, policy)
                    .context("Failed to load the manifest embedded in the message")?
                {
                    parsed.push(SourcedManifest::new(origin, manifest));
                }
            }
            test_candidates = extract_message_tests(message);
            if !test_candidates.is_empty() {
                info!("Message names tests: {}", test_candidates.join(", "));
            }
        }

        Ok(Gathered {
            manifest: ManifestMerger::new(policy).merge(parsed),
            test_candidates,
        })
    }

    async fn combine(&self) -> Result<Gathered> {
        let policy = &self.config.policy;
        let mut parsed = Vec::new();
        let mut test_candidates = TestSelection::new();

        for branch in &self.config.branches {
            let origin = ManifestOrigin::Branch(branch.name.clone());
            let text = read_source(&branch.manifest).await?;
            let parsed_branch = parse_source(&text, &origin, policy).with_context(|| {
                format!("Failed to load {origin} from {}", branch.manifest.display())
            })?;
            let Some(manifest) = parsed_branch else {
                continue;
            };
            let carries_apex = manifest.requires_apex_tests();
            parsed.push(SourcedManifest::new(origin, manifest));

            let Some(tests) = &branch.tests else {
                continue;
            };
            if !carries_apex {
                debug!(
                    "Branch '{}' deploys no Apex, ignoring its test list {}",
                    branch.name,
                    tests.display()
                );
                continue;
            }
            match fs::read_to_string(tests).await {
                Ok(list) => test_candidates.extend(TestSelection::parse_list(&list).sorted()),
                Err(e) => warn!(
                    "No test list for branch '{}' at {}: {e}",
                    branch.name,
                    tests.display()
                ),
            }
        }

        Ok(Gathered {
            manifest: ManifestMerger::new(policy).combine_branches(parsed),
            test_candidates: test_candidates
                .sorted()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    async fn test_requirement(
        &self,
        manifest: &Manifest,
        report: &ValidationReport,
        ctx: ValidationContext,
        test_candidates: Vec<String>,
        directories: Arc<PackageDirectorySet>,
    ) -> Result<TestRequirement> {
        if !report.apex_required {
            return Ok(TestRequirement::NotRequired);
        }

        if ctx.is_destructive() {
            let defaults = &self.config.policy.destroy_tests;
            if ctx.environment == EnvironmentClass::Production && !defaults.is_empty() {
                info!("Using the default destructive test set: {}", defaults.join(", "));
                return Ok(TestRequirement::Run(defaults.iter().map(String::as_str).collect()));
            }
            return Ok(TestRequirement::NotRequired);
        }

        let resolver = TestResolver::new(directories, self.config.concurrency());
        let selection = if self.config.mode == Mode::Combine {
            resolver.verify(test_candidates).await
        } else {
            resolver.resolve(manifest, &test_candidates).await
        }
        .context("Failed to determine the Apex tests for this deployment")?;
        Ok(TestRequirement::Run(selection))
    }

    fn write_outputs(&self, rendered: &str, tests: &TestRequirement) -> Result<()> {
        let output = &self.config.output;
        safe_write(&output.manifest, rendered)
            .with_context(|| format!("Failed to write manifest to {}", output.manifest.display()))?;
        info!("Wrote {}:\n{rendered}", output.manifest.display());

        safe_write(&output.tests, &tests.to_file_string())
            .with_context(|| format!("Failed to write test list to {}", output.tests.display()))?;
        info!("Wrote {}: {}", output.tests.display(), tests);
        Ok(())
    }
}

async fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest {}", path.display()))
}
