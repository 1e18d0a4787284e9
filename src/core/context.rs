//! Pipeline stage and target environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SfpkgError;

/// What the deployment invoker is about to do with the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Deploy metadata to the org
    #[default]
    Deploy,
    /// Check-only deployment
    Validate,
    /// Destructive deployment removing metadata
    Destroy,
}

/// Coarse classification of the target org.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentClass {
    /// The production org
    Production,
    /// Sandboxes, scratch orgs, and anything else
    #[default]
    NonProduction,
}

/// Inputs that select which policy branches apply during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationContext {
    /// Pipeline stage
    pub stage: Stage,
    /// Target environment
    pub environment: EnvironmentClass,
}

impl ValidationContext {
    /// Build a context for the given stage and environment.
    #[must_use]
    pub const fn new(stage: Stage, environment: EnvironmentClass) -> Self {
        Self {
            stage,
            environment,
        }
    }

    /// Destructive deployments never carry source files.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.stage == Stage::Destroy
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => write!(f, "deploy"),
            Self::Validate => write!(f, "validate"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

impl FromStr for Stage {
    type Err = SfpkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deploy" => Ok(Self::Deploy),
            "validate" => Ok(Self::Validate),
            "destroy" | "delete" => Ok(Self::Destroy),
            other => Err(SfpkgError::ConfigError {
                message: format!("unknown stage '{other}', expected deploy, validate, or destroy"),
            }),
        }
    }
}

impl fmt::Display for EnvironmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::NonProduction => write!(f, "non-production"),
        }
    }
}

impl FromStr for EnvironmentClass {
    type Err = SfpkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "non-production" | "nonproduction" | "sandbox" => Ok(Self::NonProduction),
            other => Err(SfpkgError::ConfigError {
                message: format!(
                    "unknown environment '{other}', expected production or non-production"
                ),
            }),
        }
    }
}
