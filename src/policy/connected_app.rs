//! ConnectedApp consumer key scrubbing.
//!
//! The consumer key of a connected app is org-specific and must not be
//! deployed from source. The element is removed from the
//! `<member>.connectedApp-meta.xml` file in place; everything else in the
//! file is written back byte for byte, under a fresh XML declaration.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;
use tracing::{debug, info};

use crate::constants::{CONSUMER_KEY_ELEMENT, METADATA_FILE_DECLARATION};
use crate::core::SfpkgError;
use crate::utils::fs::safe_write;

enum Step {
    Keep,
    HoldWhitespace,
    DropElement,
    DropEmpty,
}

fn is_blank(text: &BytesText<'_>) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

/// Remove every element with local name `local_name` from an XML document.
///
/// Returns `Ok(None)` when nothing matched. Otherwise returns the rewritten
/// document, starting with the metadata file declaration. Whitespace that
/// indented a removed element is removed with it.
///
/// # Errors
///
/// Returns the parser diagnostic if the document is not well-formed.
pub fn strip_element(content: &str, local_name: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::new());
    let target = local_name.as_bytes();

    let mut pending: Option<Event<'_>> = None;
    let mut depth = 0usize;
    let mut skipping = 0usize;
    let mut removed = false;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }

        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                _ => {}
            }
            continue;
        }

        let step = match &event {
            Event::Decl(_) => continue,
            Event::Text(text) if is_blank(text) => Step::HoldWhitespace,
            Event::Start(start) if start.local_name().as_ref() == target => Step::DropElement,
            Event::Empty(start) if start.local_name().as_ref() == target => Step::DropEmpty,
            _ => Step::Keep,
        };

        match step {
            Step::HoldWhitespace => {
                if let Some(held) = pending.replace(event) {
                    writer.write_event(held).map_err(|e| e.to_string())?;
                }
            }
            Step::DropElement => {
                pending = None;
                skipping = 1;
                removed = true;
            }
            Step::DropEmpty => {
                pending = None;
                removed = true;
            }
            Step::Keep => {
                if let Some(held) = pending.take() {
                    writer.write_event(held).map_err(|e| e.to_string())?;
                }
                writer.write_event(event).map_err(|e| e.to_string())?;
            }
        }
    }

    if depth != 0 {
        return Err(format!("{depth} element(s) not closed at end of document"));
    }
    if !removed {
        return Ok(None);
    }
    if let Some(held) = pending.take() {
        writer.write_event(held).map_err(|e| e.to_string())?;
    }

    let body = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;
    Ok(Some(format!("{METADATA_FILE_DECLARATION}\n{}", body.trim_start())))
}

/// Remove the consumer key from a ConnectedApp source file in place.
///
/// Returns `true` if the file was rewritten. A file without a consumer key
/// is left untouched.
///
/// # Errors
///
/// Returns [`SfpkgError::FileSystemError`] if the file cannot be read or
/// written, and [`SfpkgError::MalformedMetadataFile`] if it is not
/// well-formed XML.
pub fn scrub_consumer_key(path: &Path) -> Result<bool, SfpkgError> {
    let content = std::fs::read_to_string(path).map_err(|e| SfpkgError::FileSystemError {
        operation: format!("read ConnectedApp source: {e}"),
        path: path.display().to_string(),
    })?;

    let rewritten = strip_element(&content, CONSUMER_KEY_ELEMENT).map_err(|reason| {
        SfpkgError::MalformedMetadataFile {
            path: path.display().to_string(),
            reason,
        }
    })?;

    match rewritten {
        Some(rewritten) => {
            safe_write(path, &rewritten).map_err(|e| SfpkgError::FileSystemError {
                operation: format!("rewrite ConnectedApp source: {e:#}"),
                path: path.display().to_string(),
            })?;
            info!("Removed {CONSUMER_KEY_ELEMENT} from {}", path.display());
            Ok(true)
        }
        None => {
            debug!("No {CONSUMER_KEY_ELEMENT} in {}", path.display());
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ConnectedApp xmlns="http://soap.sforce.com/2006/04/metadata">
    <contactEmail>admin@example.com</contactEmail>
    <label>Portal</label>
    <oauthConfig>
        <callbackUrl>https://example.com/callback</callbackUrl>
        <consumerKey>3MVG9secret</consumerKey>
        <scopes>Api</scopes>
    </oauthConfig>
</ConnectedApp>
"#;

    #[test]
    fn test_strip_consumer_key() {
        let rewritten = strip_element(APP, CONSUMER_KEY_ELEMENT).unwrap().unwrap();
        assert!(rewritten.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ConnectedApp"));
        assert!(!rewritten.contains("consumerKey"));
        assert!(!rewritten.contains("3MVG9secret"));
        assert!(rewritten.contains(
            "<callbackUrl>https://example.com/callback</callbackUrl>\n        <scopes>Api</scopes>"
        ));
        assert!(rewritten.contains("<contactEmail>admin@example.com</contactEmail>"));
    }

    #[test]
    fn test_strip_nothing_to_remove() {
        let content = "<ConnectedApp><label>Portal</label></ConnectedApp>";
        assert_eq!(strip_element(content, CONSUMER_KEY_ELEMENT).unwrap(), None);
    }

    #[test]
    fn test_strip_empty_element_and_prefixed_name() {
        let content =
            r#"<a:ConnectedApp xmlns:a="urn:x"><a:consumerKey/><a:label>L</a:label></a:ConnectedApp>"#;
        let rewritten = strip_element(content, CONSUMER_KEY_ELEMENT).unwrap().unwrap();
        assert!(rewritten.ends_with(
            r#"<a:ConnectedApp xmlns:a="urn:x"><a:label>L</a:label></a:ConnectedApp>"#
        ));
    }

    #[test]
    fn test_strip_rejects_malformed() {
        let unclosed = "<ConnectedApp><consumerKey>x</ConnectedApp>";
        assert!(strip_element(unclosed, CONSUMER_KEY_ELEMENT).is_err());
        assert!(strip_element("<ConnectedApp><label>x</label>", CONSUMER_KEY_ELEMENT).is_err());
    }

    #[test]
    fn test_scrub_rewrites_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Portal.connectedApp-meta.xml");
        std::fs::write(&path, APP).unwrap();

        assert!(scrub_consumer_key(&path).unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("consumerKey"));

        assert!(!scrub_consumer_key(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn test_scrub_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = scrub_consumer_key(&temp.path().join("Gone.connectedApp-meta.xml"));
        assert!(matches!(result, Err(SfpkgError::FileSystemError { .. })));
    }
}
