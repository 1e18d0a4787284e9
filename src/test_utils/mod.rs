//! Test utilities for sfpkg
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`init_test_logging`] installs a test-friendly tracing subscriber once
//! - [`SourceTree`] builds a throwaway Salesforce DX project (descriptor,
//!   Apex classes, triggers, ConnectedApps, manifests) in a temp directory
//!
//! # Example
//!
//! ```rust,no_run
//! use sfpkg_cli::test_utils::SourceTree;
//!
//! # fn example() -> anyhow::Result<()> {
//! let tree = SourceTree::new()?;
//! tree.add_class("AccountHandler", "@isTest\npublic class AccountHandler {}")?;
//! let manifest =
//!     tree.write_manifest("package.xml", &[("ApexClass", &["AccountHandler"])], Some("60.0"))?;
//! assert!(manifest.exists());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{OutputConfig, PipelineConfig, SourcesConfig};
use crate::constants::{CONVENTIONAL_SOURCE_DIR, DEFAULT_PROJECT_FILE};
use crate::manifest::{ApiVersion, Manifest, serializer};
use crate::project::{PackageDirectorySet, SearchMode};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, tests run
/// without a subscriber.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// A Salesforce DX project in a temp directory.
///
/// The project has one package directory, `force-app`, declared in
/// `sfdx-project.json`. Sources are written under the conventional
/// `main/default/<folder>` layout so both search modes find them.
pub struct SourceTree {
    temp: TempDir,
    package_dir: PathBuf,
}

impl SourceTree {
    /// Create the project with `sourceApiVersion` 60.0.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory or descriptor cannot be written.
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("Failed to create temp dir")?;
        let package_dir = temp.path().join("force-app");
        std::fs::create_dir_all(package_dir.join(CONVENTIONAL_SOURCE_DIR))?;
        std::fs::write(
            temp.path().join(DEFAULT_PROJECT_FILE),
            r#"{
  "packageDirectories": [{ "path": "force-app", "default": true }],
  "sourceApiVersion": "60.0"
}
"#,
        )?;
        Ok(Self {
            temp,
            package_dir,
        })
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Path of a file relative to the project root.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file relative to the project root, creating parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn write_source(&self, folder: &str, file_name: &str, content: &str) -> Result<PathBuf> {
        let relative = format!("force-app/{CONVENTIONAL_SOURCE_DIR}/{folder}/{file_name}");
        self.write(&relative, content)
    }

    /// Add `classes/<name>.cls`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_class(&self, name: &str, body: &str) -> Result<PathBuf> {
        self.write_source("classes", &format!("{name}.cls"), body)
    }

    /// Add `triggers/<name>.trigger`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_trigger(&self, name: &str, body: &str) -> Result<PathBuf> {
        self.write_source("triggers", &format!("{name}.trigger"), body)
    }

    /// Add `connectedApps/<name>.connectedApp-meta.xml`, optionally with a consumer key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn add_connected_app(&self, name: &str, consumer_key: Option<&str>) -> Result<PathBuf> {
        let key = consumer_key
            .map(|key| format!("\n        <consumerKey>{key}</consumerKey>"))
            .unwrap_or_default();
        let content = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ConnectedApp xmlns="http://soap.sforce.com/2006/04/metadata">
    <contactEmail>admin@example.com</contactEmail>
    <label>{name}</label>
    <oauthConfig>
        <callbackUrl>https://example.com/callback</callbackUrl>{key}
        <scopes>Api</scopes>
    </oauthConfig>
</ConnectedApp>
"#
        );
        self.write_source("connectedApps", &format!("{name}.connectedApp-meta.xml"), &content)
    }

    /// Render a manifest and write it relative to the project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_manifest(
        &self,
        relative: &str,
        entries: &[(&str, &[&str])],
        version: Option<&str>,
    ) -> Result<PathBuf> {
        let mut manifest = Manifest::new();
        for (type_name, members) in entries {
            let entry = manifest.entry_mut(type_name);
            for member in *members {
                entry.insert(*member);
            }
        }
        manifest.set_version(version.and_then(ApiVersion::parse));
        self.write(relative, &serializer::render(&manifest))
    }

    /// Directory set over `force-app`.
    ///
    /// # Errors
    ///
    /// Never fails for a tree built by [`SourceTree::new`].
    pub fn directories(&self, mode: SearchMode) -> Result<PackageDirectorySet> {
        Ok(PackageDirectorySet::new(vec![self.package_dir.clone()], mode)?)
    }

    /// Pipeline config rooted in this project, with no sources set.
    ///
    /// Outputs go to `out/package.xml` and `out/runTests.txt`.
    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            project_file: self.path(DEFAULT_PROJECT_FILE),
            sources: SourcesConfig::default(),
            concurrency: Some(4),
            output: OutputConfig {
                manifest: self.path("out/package.xml"),
                tests: self.path("out/runTests.txt"),
            },
            ..PipelineConfig::default()
        }
    }
}
