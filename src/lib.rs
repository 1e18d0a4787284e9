//! sfpkg - Salesforce deployment manifest assembly and policy validation
//!
//! `sfpkg` runs as one step of a CI pipeline, between the structural diff
//! tool and the deployment command. It:
//!
//! - merges the diff-tool `package.xml`, a hand-maintained manifest, and a
//!   manifest embedded in the commit message into one canonical manifest
//! - validates that manifest against organizational policy (schema shape,
//!   no wildcards, no banned umbrella types, no empty type blocks)
//! - scrubs consumer keys from ConnectedApp sources before they are deployed
//! - derives and verifies the Apex test classes the deployment must run
//!
//! The outputs are a sorted `package.xml` and a test list file. The
//! space-delimited test list (or the sentinel `not a test`) is printed to
//! stdout for shell capture.
//!
//! # Core Modules
//!
//! - [`manifest`] - manifest model, XML parsing, merging, and rendering
//! - [`policy`] - the validation pass and ConnectedApp scrubbing
//! - [`apex`] - test class derivation and verification
//! - [`pipeline`] - one run from sources to written artifacts
//!
//! # Supporting Modules
//!
//! - [`config`] - `sfpkg.toml` and `SFPKG_*` overrides
//! - [`core`] - error taxonomy, stage and environment, metadata kinds
//! - [`project`] - `sfdx-project.json` and package directory lookup
//! - [`constants`] - manifest literals and policy defaults
//! - [`utils`] - atomic writes
//!
//! # Example
//!
//! ```rust,no_run
//! use sfpkg_cli::config::PipelineConfig;
//! use sfpkg_cli::pipeline::Pipeline;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::load().await?;
//! let outcome = Pipeline::new(config).run().await?;
//! println!("{}", outcome.tests);
//! # Ok(())
//! # }
//! ```

// Pipeline stages
pub mod apex;
pub mod manifest;
pub mod pipeline;
pub mod policy;

// Supporting modules
pub mod config;
pub mod constants;
pub mod core;
pub mod project;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
