//! Integration test suite for sfpkg
//!
//! End-to-end tests that build a throwaway Salesforce DX project with
//! [`sfpkg_cli::test_utils::SourceTree`] and run the pipeline against it,
//! through the library and through the `sfpkg` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **assemble**: merging diff, static, and message manifests
//! - **binary**: the `sfpkg` executable, its stdout contract and exit status
//! - **combine**: branch combine mode
//! - **policy**: fatal policy conditions and ConnectedApp scrubbing
//! - **tests_resolution**: Apex test derivation and verification

mod assemble;
mod binary;
mod combine;
mod policy;
mod tests_resolution;
