//! Project descriptor and package directory lookup.
//!
//! Salesforce DX projects list their source roots in `sfdx-project.json`:
//!
//! ```json
//! {
//!   "packageDirectories": [
//!     { "path": "force-app", "default": true },
//!     { "path": "unpackaged" }
//!   ],
//!   "sourceApiVersion": "60.0"
//! }
//! ```
//!
//! [`PackageDirectorySet`] is the read-only view the pipeline gets of those
//! roots. It locates member source files either by walking every root
//! recursively or by probing the conventional `main/default/<folder>` path.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::constants::CONVENTIONAL_SOURCE_DIR;
use crate::core::{MetadataKind, SfpkgError};

/// How member files are located below a package directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Walk the whole directory tree
    #[default]
    Recursive,
    /// Only look in `main/default/<type folder>`
    Conventional,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    #[serde(default)]
    package_directories: Vec<RawPackageDirectory>,
    #[serde(default)]
    source_api_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPackageDirectory {
    path: String,
}

/// Parsed `sfdx-project.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfdxProject {
    package_directories: Vec<PathBuf>,
    source_api_version: Option<String>,
}

impl SfdxProject {
    /// Read and parse a project descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::ProjectFileError`] if the file cannot be read or
    /// is not valid JSON.
    pub fn load(path: &Path) -> Result<Self, SfpkgError> {
        let content = std::fs::read_to_string(path).map_err(|e| SfpkgError::ProjectFileError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&content, root).map_err(|reason| SfpkgError::ProjectFileError {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse descriptor JSON; relative package paths resolve against `root`.
    ///
    /// # Errors
    ///
    /// Returns the JSON diagnostic if the content does not parse.
    pub fn parse(content: &str, root: PathBuf) -> Result<Self, String> {
        let raw: RawProject = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let mut seen = HashSet::new();
        let package_directories = raw
            .package_directories
            .into_iter()
            .map(|dir| root.join(dir.path.trim_end_matches(['/', '\\'])))
            .filter(|dir| seen.insert(dir.clone()))
            .collect();
        Ok(Self {
            package_directories,
            source_api_version: raw.source_api_version,
        })
    }

    /// Declared package directories, de-duplicated, in declaration order.
    #[must_use]
    pub fn package_directories(&self) -> &[PathBuf] {
        &self.package_directories
    }

    /// The project's `sourceApiVersion`, if declared.
    #[must_use]
    pub fn source_api_version(&self) -> Option<&str> {
        self.source_api_version.as_deref()
    }
}

/// Filesystem roots under which metadata source files are searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDirectorySet {
    roots: Vec<PathBuf>,
    mode: SearchMode,
}

impl PackageDirectorySet {
    /// Create a set over `roots`.
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::ConfigError`] if `roots` is empty.
    pub fn new(roots: Vec<PathBuf>, mode: SearchMode) -> Result<Self, SfpkgError> {
        if roots.is_empty() {
            return Err(SfpkgError::ConfigError {
                message: "no package directories configured".to_string(),
            });
        }
        Ok(Self {
            roots,
            mode,
        })
    }

    /// File name of the source artifact for `member`, if the kind has one.
    #[must_use]
    pub fn member_file_name(kind: MetadataKind, member: &str) -> Option<String> {
        kind.source_suffix().map(|suffix| format!("{member}{suffix}"))
    }

    /// Locate the source file of a manifest member.
    ///
    /// Roots are searched in order; the first hit wins.
    #[must_use]
    pub fn find_member_file(&self, kind: MetadataKind, member: &str) -> Option<PathBuf> {
        let file_name = Self::member_file_name(kind, member)?;
        match self.mode {
            SearchMode::Recursive => self.find_recursive(&file_name),
            SearchMode::Conventional => {
                let folder = kind.conventional_folder()?;
                self.roots
                    .iter()
                    .map(|root| root.join(CONVENTIONAL_SOURCE_DIR).join(folder).join(&file_name))
                    .find(|candidate| candidate.is_file())
            }
        }
    }

    /// Walk every root for a file with exactly this name.
    #[must_use]
    pub fn find_recursive(&self, file_name: &str) -> Option<PathBuf> {
        for root in &self.roots {
            trace!("Searching {} for {}", root.display(), file_name);
            let hit = WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name);
            if let Some(entry) = hit {
                return Some(entry.into_path());
            }
        }
        None
    }

    /// Names of every Apex class (`*.cls` file stem) below the roots.
    ///
    /// Used to verify test class candidates with one walk instead of one per
    /// candidate. Honors the search mode: in conventional mode only files
    /// directly in `main/default/classes` count, matching
    /// [`find_member_file`](Self::find_member_file).
    #[must_use]
    pub fn apex_class_names(&self) -> HashSet<String> {
        let suffix = ".cls";
        let mut names = HashSet::new();
        for root in &self.roots {
            let (base, max_depth) = match self.mode {
                SearchMode::Recursive => (root.clone(), usize::MAX),
                SearchMode::Conventional => {
                    (root.join(CONVENTIONAL_SOURCE_DIR).join("classes"), 1)
                }
            };
            for entry in WalkDir::new(&base)
                .max_depth(max_depth)
                .follow_links(false)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_file())
            {
                if let Some(stem) = entry.file_name().to_str().and_then(|n| n.strip_suffix(suffix))
                {
                    names.insert(stem.to_string());
                }
            }
        }
        debug!("Indexed {} Apex classes", names.len());
        names
    }
}
