//! Manifest blocks embedded in commit and merge-request messages.
//!
//! Developers can paste a `package.xml` into the message describing a change
//! to deploy metadata the diff tool cannot see. The first
//! `<Package ...>...</Package>` block, with an optional XML declaration in
//! front, is taken as the message manifest.

use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

fn package_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)(?:<\?xml[^>]*\?>\s*)?<Package\b[^>]*>.*?</Package>")
            .expect("package block pattern is valid")
    })
}

/// Extract the first embedded manifest from free text.
///
/// Returns `None` when the text holds no `<Package>` block.
///
/// ```rust
/// use sfpkg_cli::manifest::embedded::extract_embedded_manifest;
///
/// let message = "Fix handler\n\n<Package xmlns=\"x\"><version>60.0</version></Package>\nthanks";
/// let block = extract_embedded_manifest(message).unwrap();
/// assert!(block.starts_with("<Package") && block.ends_with("</Package>"));
/// assert!(extract_embedded_manifest("no manifest here").is_none());
/// ```
#[must_use]
pub fn extract_embedded_manifest(text: &str) -> Option<&str> {
    match package_block().find(text) {
        Some(found) => {
            info!("Found package.xml contents in the message");
            Some(found.as_str().trim())
        }
        None => {
            info!("Package.xml contents not found in the message");
            None
        }
    }
}
