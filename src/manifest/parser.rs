//! Manifest document parsing.
//!
//! Parsing happens in two steps. [`parse_document`] turns XML text into a
//! [`PackageDocument`] that keeps everything the schema checks need to see
//! (root identity, every top-level child, every `<name>` of a type block).
//! [`PackageDocument::check_schema`] then enforces the fixed manifest shape,
//! and [`PackageDocument::into_manifest`] produces the typed [`Manifest`].
//!
//! Member-level policy (empty member lists, wildcards, banned types) is not
//! checked here: the merger filters wildcards and the policy validator
//! rejects whatever survives.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use tracing::{debug, warn};

use super::{ApiVersion, Manifest, ManifestOrigin};
use crate::config::PolicyConfig;
use crate::constants::{MEMBERS_ELEMENT, NAME_ELEMENT, PACKAGE_ROOT, TYPES_ELEMENT, VERSION_ELEMENT};
use crate::core::SfpkgError;

/// One `<types>` block exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeBlock {
    /// Every `<name>` value; the schema requires exactly one
    pub names: Vec<String>,
    /// Every `<members>` value, duplicates included
    pub members: Vec<String>,
}

/// A top-level child of the manifest root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChild {
    /// A `<types>` block
    Types(TypeBlock),
    /// A `<version>` leaf
    Version(String),
    /// Any other element, by local name
    Unexpected(String),
}

/// Structural view of a manifest document, before schema checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDocument {
    /// Local name of the root element
    pub root_name: String,
    /// Namespace the root element is bound to
    pub namespace: Option<String>,
    /// Top-level children in document order
    pub children: Vec<DocumentChild>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Name,
    Member,
    Version,
}

fn malformed(origin: &str, reason: impl ToString) -> SfpkgError {
    SfpkgError::MalformedManifest {
        origin: origin.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse XML text into a [`PackageDocument`].
///
/// `origin` labels the document in error messages.
///
/// # Errors
///
/// Returns [`SfpkgError::MalformedManifest`] if the text is not well-formed
/// XML: mismatched or unclosed tags, no root element, more than one root
/// element, or an unbound namespace prefix.
pub fn parse_document(text: &str, origin: &str) -> Result<PackageDocument, SfpkgError> {
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut root: Option<(String, Option<String>)> = None;
    let mut children = Vec::new();
    let mut block: Option<TypeBlock> = None;
    let mut leaf: Option<Leaf> = None;
    let mut text_buf = String::new();

    loop {
        let (resolved, event) = reader.read_resolved_event().map_err(|e| malformed(origin, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let level = depth + 1;
                match level {
                    1 => {
                        if root.is_some() {
                            return Err(malformed(origin, "more than one root element"));
                        }
                        let namespace = match resolved {
                            ResolveResult::Bound(ns) => {
                                Some(String::from_utf8_lossy(ns.as_ref()).into_owned())
                            }
                            ResolveResult::Unbound => None,
                            ResolveResult::Unknown(prefix) => {
                                return Err(malformed(
                                    origin,
                                    format!(
                                        "unbound namespace prefix '{}'",
                                        String::from_utf8_lossy(&prefix)
                                    ),
                                ));
                            }
                        };
                        root = Some((local, namespace));
                    }
                    2 => match local.as_str() {
                        TYPES_ELEMENT if is_empty => {
                            children.push(DocumentChild::Types(TypeBlock::default()));
                        }
                        TYPES_ELEMENT => block = Some(TypeBlock::default()),
                        VERSION_ELEMENT if is_empty => {
                            children.push(DocumentChild::Version(String::new()));
                        }
                        VERSION_ELEMENT => leaf = Some(Leaf::Version),
                        _ => children.push(DocumentChild::Unexpected(local)),
                    },
                    3 => {
                        if let Some(current) = block.as_mut() {
                            match (local.as_str(), is_empty) {
                                (NAME_ELEMENT, true) => current.names.push(String::new()),
                                (MEMBERS_ELEMENT, true) => current.members.push(String::new()),
                                (NAME_ELEMENT, false) => leaf = Some(Leaf::Name),
                                (MEMBERS_ELEMENT, false) => leaf = Some(Leaf::Member),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }
                text_buf.clear();
                if !is_empty {
                    depth = level;
                }
            }
            Event::Text(ref t) => {
                if leaf.is_some() {
                    let unescaped = t.unescape().map_err(|e| malformed(origin, e))?;
                    text_buf.push_str(&unescaped);
                }
            }
            Event::CData(ref c) => {
                if leaf.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(c));
                }
            }
            Event::End(_) => {
                match (depth, leaf) {
                    (3, Some(Leaf::Name)) => {
                        if let Some(current) = block.as_mut() {
                            current.names.push(text_buf.trim().to_string());
                        }
                        leaf = None;
                    }
                    (3, Some(Leaf::Member)) => {
                        if let Some(current) = block.as_mut() {
                            current.members.push(text_buf.trim().to_string());
                        }
                        leaf = None;
                    }
                    (2, Some(Leaf::Version)) => {
                        children.push(DocumentChild::Version(text_buf.trim().to_string()));
                        leaf = None;
                    }
                    (2, _) => {
                        if let Some(done) = block.take() {
                            children.push(DocumentChild::Types(done));
                        }
                    }
                    _ => {}
                }
                text_buf.clear();
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(malformed(origin, "unexpected end of document (unclosed element)"));
    }
    let (root_name, namespace) = root.ok_or_else(|| malformed(origin, "no root element"))?;
    debug!("Parsed {} with {} top-level elements", origin, children.len());

    Ok(PackageDocument {
        root_name,
        namespace,
        children,
    })
}

impl PackageDocument {
    /// Type blocks in document order.
    pub fn type_blocks(&self) -> impl Iterator<Item = &TypeBlock> {
        self.children.iter().filter_map(|child| match child {
            DocumentChild::Types(block) => Some(block),
            _ => None,
        })
    }

    /// Declared versions in document order.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            DocumentChild::Version(version) => Some(version.as_str()),
            _ => None,
        })
    }

    /// Enforce the fixed manifest shape.
    ///
    /// Checks run in this order and the first failure is returned:
    /// 1. only `<types>` and `<version>` children
    /// 2. root element named `Package`
    /// 3. root bound to the configured namespace
    /// 4. exactly one `<name>` per type block
    /// 5. at most one `<version>`, holding a decimal number
    ///
    /// # Errors
    ///
    /// Returns [`SfpkgError::SchemaViolation`] for steps 1-3 and 5's format
    /// check, [`SfpkgError::PolicyViolation`] for the cardinality checks.
    pub fn check_schema(&self, policy: &PolicyConfig) -> Result<(), SfpkgError> {
        if let Some(DocumentChild::Unexpected(tag)) =
            self.children.iter().find(|child| matches!(child, DocumentChild::Unexpected(_)))
        {
            return Err(SfpkgError::SchemaViolation {
                reason: format!(
                    "Unable to parse <{tag}> tag, \
                     expected tags are <{TYPES_ELEMENT}> and <{VERSION_ELEMENT}>"
                ),
            });
        }

        if self.root_name != PACKAGE_ROOT {
            return Err(SfpkgError::SchemaViolation {
                reason: format!(
                    "Root name is '{}' whereas it should be '{PACKAGE_ROOT}'",
                    self.root_name
                ),
            });
        }

        if self.namespace.as_deref() != Some(policy.namespace.as_str()) {
            return Err(SfpkgError::SchemaViolation {
                reason: format!(
                    "Namespace is missing or defined incorrectly, it should be '{}'",
                    policy.namespace
                ),
            });
        }

        for block in self.type_blocks() {
            match block.names.as_slice() {
                [name] if !name.is_empty() => {}
                [] | [_] => {
                    return Err(SfpkgError::PolicyViolation {
                        reason: format!(
                            "<{NAME_ELEMENT}> tag is missing in a <{TYPES_ELEMENT}> block \
                             with members [{}]",
                            block.members.join(", ")
                        ),
                    });
                }
                names => {
                    return Err(SfpkgError::PolicyViolation {
                        reason: format!(
                            "Multiple <{NAME_ELEMENT}> tags [{}] present \
                             in a single <{TYPES_ELEMENT}> block",
                            names.join(", ")
                        ),
                    });
                }
            }
        }

        let versions: Vec<&str> = self.versions().collect();
        if versions.len() > 1 {
            return Err(SfpkgError::PolicyViolation {
                reason: format!(
                    "Multiple versions [{}] are declared, remove the duplicates",
                    versions.join(", ")
                ),
            });
        }
        if let Some(version) = versions.first() {
            if ApiVersion::parse(version).is_none() {
                return Err(SfpkgError::SchemaViolation {
                    reason: format!("Version '{version}' is not a decimal API version"),
                });
            }
        }

        Ok(())
    }

    /// Build the typed manifest.
    ///
    /// Expects [`check_schema`](Self::check_schema) to have passed: blocks
    /// without exactly one name are skipped, and only the first version is
    /// kept. Members of blocks sharing a type name are unioned.
    #[must_use]
    pub fn into_manifest(self) -> Manifest {
        let mut manifest = Manifest::new();
        let mut version = None;
        for child in self.children {
            match child {
                DocumentChild::Types(block) => {
                    let [name] = block.names.as_slice() else {
                        continue;
                    };
                    let entry = manifest.entry_mut(name);
                    for member in block.members {
                        entry.insert(member);
                    }
                }
                DocumentChild::Version(raw) if version.is_none() => {
                    version = ApiVersion::parse(&raw);
                }
                _ => {}
            }
        }
        manifest.set_version(version);
        manifest
    }
}

/// Parse and schema-check a manifest document.
///
/// # Errors
///
/// Returns [`SfpkgError::MalformedManifest`], [`SfpkgError::SchemaViolation`],
/// or [`SfpkgError::PolicyViolation`] as described on [`parse_document`] and
/// [`PackageDocument::check_schema`].
pub fn parse_manifest(
    text: &str,
    origin: &str,
    policy: &PolicyConfig,
) -> Result<Manifest, SfpkgError> {
    let document = parse_document(text, origin)?;
    document.check_schema(policy)?;
    Ok(document.into_manifest())
}

/// Parse a manifest from a pipeline source, honoring its optionality.
///
/// A malformed document from an optional origin (message, branch) is logged
/// and contributes nothing. Required origins fail the run.
///
/// # Errors
///
/// Returns any parse or schema error from a required origin, and schema
/// errors from every origin.
pub fn parse_source(
    text: &str,
    origin: &ManifestOrigin,
    policy: &PolicyConfig,
) -> Result<Option<Manifest>, SfpkgError> {
    match parse_manifest(text, &origin.to_string(), policy) {
        Ok(manifest) => Ok(Some(manifest)),
        Err(SfpkgError::MalformedManifest {
            reason,
            ..
        }) if !origin.is_required() => {
            warn!("Unable to parse the {origin}, skipping it: {reason}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
