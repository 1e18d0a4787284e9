//! Canonical manifest rendering.
//!
//! Output is stable so that generated manifests diff cleanly between runs:
//! type blocks sorted case-insensitively by name, members sorted
//! case-insensitively within each block, `<name>` after the members, and a
//! trailing `<version>` only when one was resolved.

use quick_xml::escape::escape;
use std::cmp::Ordering;

use super::Manifest;
use crate::constants::{MANIFEST_DECLARATION, PACKAGE_ROOT};

/// Case-insensitive ordering with a byte-order tie-break, so `a`/`A` pairs
/// still sort deterministically.
pub fn case_insensitive(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Render a manifest in the metadata namespace.
#[must_use]
pub fn render(manifest: &Manifest) -> String {
    render_with_namespace(manifest, crate::constants::METADATA_NAMESPACE)
}

/// Render a manifest with an explicit root namespace.
#[must_use]
pub fn render_with_namespace(manifest: &Manifest, namespace: &str) -> String {
    let mut out = String::new();
    out.push_str(MANIFEST_DECLARATION);
    out.push('\n');
    out.push_str(&format!("<{PACKAGE_ROOT} xmlns=\"{}\">\n", escape(namespace)));

    let mut entries: Vec<_> = manifest.entries().collect();
    entries.sort_by(|a, b| case_insensitive(a.type_name(), b.type_name()));

    for entry in entries {
        let mut members: Vec<&str> = entry.members().collect();
        members.sort_by(|a, b| case_insensitive(a, b));

        out.push_str("\t<types>\n");
        for member in members {
            out.push_str(&format!("\t\t<members>{}</members>\n", escape(member)));
        }
        out.push_str(&format!("\t\t<name>{}</name>\n", escape(entry.type_name())));
        out.push_str("\t</types>\n");
    }

    if let Some(version) = manifest.version() {
        out.push_str(&format!("\t<version>{}</version>\n", escape(version.as_str())));
    }
    out.push_str(&format!("</{PACKAGE_ROOT}>\n"));
    out
}
