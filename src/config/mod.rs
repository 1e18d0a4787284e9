//! Configuration for sfpkg
//!
//! A pipeline run is configured by a TOML file (`sfpkg.toml` in the working
//! directory, or the path in `SFPKG_CONFIG`) plus a few environment
//! overrides that CI jobs set per stage. A missing file yields the defaults,
//! which match a single-package project deploying the diff-tool output.
//!
//! ```toml
//! stage = "validate"                 # deploy | validate | destroy
//! environment = "production"         # production | non-production
//! mode = "assemble"                  # assemble | combine | check
//! project_file = "sfdx-project.json"
//! search = "recursive"               # recursive | conventional
//! concurrency = 8
//!
//! [sources]
//! diff = "changed-sources/package/package.xml"
//! manifest = "manifest/package.xml"
//! message_file = "commit_message.txt"
//!
//! [output]
//! manifest = "package.xml"
//! tests = "runTests.txt"
//!
//! [policy]
//! wildcard = "error"                 # error | warn
//! trust_diff_version = false
//! destroy_tests = ["SmokeTest"]
//!
//! [[policy.banned_types]]
//! name = "Workflow"
//! alternatives = ["WorkflowRule", "WorkflowFieldUpdate"]
//!
//! [[branches]]                       # combine mode only
//! name = "feature/a"
//! manifest = "branches/a/package.xml"
//! tests = "branches/a/runTests.txt"
//! ```
//!
//! # Environment overrides
//!
//! - `SFPKG_CONFIG` - config file path
//! - `SFPKG_STAGE` - pipeline stage
//! - `SFPKG_ENVIRONMENT` - target environment class
//! - `SFPKG_MESSAGE` - commit or merge-request message text
//! - `SFPKG_MESSAGE_FILE` - file holding the message text

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::constants::{
    DEFAULT_BANNED_TYPE, DEFAULT_CONFIG_FILE, DEFAULT_PROJECT_FILE, METADATA_NAMESPACE,
    WORKFLOW_CHILD_TYPES,
};
use crate::core::{EnvironmentClass, SfpkgError, Stage, ValidationContext};
use crate::project::SearchMode;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SFPKG_CONFIG";
/// Environment variable overriding the stage.
pub const STAGE_ENV: &str = "SFPKG_STAGE";
/// Environment variable overriding the environment class.
pub const ENVIRONMENT_ENV: &str = "SFPKG_ENVIRONMENT";
/// Environment variable carrying the commit or merge-request message.
pub const MESSAGE_ENV: &str = "SFPKG_MESSAGE";
/// Environment variable naming a file with the message.
pub const MESSAGE_FILE_ENV: &str = "SFPKG_MESSAGE_FILE";

/// How the manifest sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Diff-tool output, static manifest, and embedded message manifest
    #[default]
    Assemble,
    /// One manifest (and test list) per independent branch
    Combine,
    /// Validate the static manifest on its own
    Check,
}

/// What the validator does with a `*` member that reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WildcardPolicy {
    /// Fail the run
    #[default]
    Error,
    /// Strip the member and log a warning
    Warn,
}

/// A metadata type that may not appear in any manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannedType {
    /// Type name, compared case-insensitively
    pub name: String,
    /// Types to declare instead, listed in the error message
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Organizational policy injected into parser, merger, and validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Namespace the manifest root must be bound to
    pub namespace: String,
    /// Types rejected outright
    pub banned_types: Vec<BannedType>,
    /// Handling of `*` members that survive to validation
    pub wildcard: WildcardPolicy,
    /// Whether a diff-tool manifest may set the API version
    pub trust_diff_version: bool,
    /// Tests attached to destructive deployments against production
    pub destroy_tests: Vec<String>,
    /// Fall back to `sourceApiVersion` when no trusted version was declared
    pub project_version_fallback: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            namespace: METADATA_NAMESPACE.to_string(),
            banned_types: vec![BannedType {
                name: DEFAULT_BANNED_TYPE.to_string(),
                alternatives: WORKFLOW_CHILD_TYPES.iter().map(ToString::to_string).collect(),
            }],
            wildcard: WildcardPolicy::Error,
            trust_diff_version: false,
            destroy_tests: Vec::new(),
            project_version_fallback: false,
        }
    }
}

impl PolicyConfig {
    /// Find the banned entry matching `type_name`, ignoring case.
    #[must_use]
    pub fn banned(&self, type_name: &str) -> Option<&BannedType> {
        self.banned_types.iter().find(|banned| banned.name.eq_ignore_ascii_case(type_name.trim()))
    }
}

/// Manifest inputs for assemble mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Manifest produced by the structural diff tool
    pub diff: Option<PathBuf>,
    /// Hand-maintained manifest in the repository
    pub manifest: Option<PathBuf>,
    /// File holding the commit or merge-request message
    pub message_file: Option<PathBuf>,
    /// Message text given inline or through `SFPKG_MESSAGE`
    pub message: Option<String>,
}

/// One branch in combine mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSource {
    /// Branch label used in log output
    pub name: String,
    /// Manifest contents of the branch, extracted by the caller
    pub manifest: PathBuf,
    /// Persisted test list of the branch
    #[serde(default)]
    pub tests: Option<PathBuf>,
}

/// Where the run writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Canonical manifest
    pub manifest: PathBuf,
    /// Comma-delimited test class list
    pub tests: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("package.xml"),
            tests: PathBuf::from("runTests.txt"),
        }
    }
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline stage
    pub stage: Stage,
    /// Target environment class
    pub environment: EnvironmentClass,
    /// Source combination mode
    pub mode: Mode,
    /// Project descriptor listing package directories
    pub project_file: PathBuf,
    /// Explicit package directories, overriding the project descriptor
    pub package_directories: Vec<PathBuf>,
    /// How source files are located below each package directory
    pub search: SearchMode,
    /// Resolver worker pool size; defaults to twice the core count
    pub concurrency: Option<usize>,
    /// Assemble-mode inputs
    pub sources: SourcesConfig,
    /// Combine-mode inputs
    pub branches: Vec<BranchSource>,
    /// Output artifacts
    pub output: OutputConfig,
    /// Organizational policy
    pub policy: PolicyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage: Stage::default(),
            environment: EnvironmentClass::default(),
            mode: Mode::default(),
            project_file: PathBuf::from(DEFAULT_PROJECT_FILE),
            package_directories: Vec::new(),
            search: SearchMode::default(),
            concurrency: None,
            sources: SourcesConfig {
                diff: Some(PathBuf::from("changed-sources/package/package.xml")),
                ..SourcesConfig::default()
            },
            branches: Vec::new(),
            output: OutputConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load the configuration for this process.
    ///
    /// Reads `SFPKG_CONFIG` or `sfpkg.toml` in the working directory, falls
    /// back to defaults when the file does not exist, then applies the
    /// `SFPKG_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if an override holds an unknown value.
    pub async fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            Self::load_from(&path).await?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok()).await?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds invalid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown stage or environment values and for an
    /// unreadable message file.
    pub async fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(stage) = lookup(STAGE_ENV) {
            self.stage = stage.parse()?;
        }
        if let Some(environment) = lookup(ENVIRONMENT_ENV) {
            self.environment = environment.parse()?;
        }
        if let Some(message) = lookup(MESSAGE_ENV) {
            self.sources.message = Some(message);
        }
        if let Some(path) = lookup(MESSAGE_FILE_ENV) {
            self.sources.message_file = Some(PathBuf::from(path));
        }
        if self.sources.message.is_none() {
            if let Some(path) = &self.sources.message_file {
                let message = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read message file {}", path.display()))?;
                self.sources.message = Some(message);
            }
        }
        Ok(())
    }

    /// Check settings that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::ConfigError`] for a zero worker pool, combine mode
    /// without branches, check mode without a static manifest, or assemble
    /// mode without any manifest source.
    pub fn validate(&self) -> Result<(), SfpkgError> {
        if self.concurrency == Some(0) {
            return Err(SfpkgError::ConfigError {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        match self.mode {
            Mode::Combine if self.branches.is_empty() => Err(SfpkgError::ConfigError {
                message: "combine mode needs at least one [[branches]] entry".to_string(),
            }),
            Mode::Check if self.sources.manifest.is_none() => Err(SfpkgError::ConfigError {
                message: "check mode needs sources.manifest".to_string(),
            }),
            Mode::Assemble
                if self.sources.diff.is_none()
                    && self.sources.manifest.is_none()
                    && self.sources.message.is_none() =>
            {
                Err(SfpkgError::ConfigError {
                    message: "no manifest source configured in [sources]".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Worker pool size for the test resolver.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(crate::constants::default_concurrency)
    }

    /// Stage and environment as a validation context.
    #[must_use]
    pub const fn validation_context(&self) -> ValidationContext {
        ValidationContext::new(self.stage, self.environment)
    }
}
