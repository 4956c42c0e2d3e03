//! Embedding bundles in host documents.
//!
//! An exported page carries its own save data inside a single well-known
//! element. No such element means "no embedded save", which is not an error.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bundle::{Bundle, BundleError};

/// Id of the element that carries an embedded bundle.
pub const BUNDLE_ANCHOR_ID: &str = "flicksy-bundle";

/// A document with named anchor elements whose text content can be read and replaced.
pub trait HostDocument {
    /// Text content of the anchor, or `None` if the document has no such element.
    fn anchor_text(&self, anchor_id: &str) -> Option<String>;

    /// Replace the anchor's content, creating the element if needed.
    fn set_anchor_text(&mut self, anchor_id: &str, text: &str);
}

/// An HTML page held as source text.
///
/// Anchors are `<script id="...">` elements. Only the double-quoted
/// `id="..."` spelling is recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlDocument {
    source: String,
}

impl HtmlDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// A minimal empty page.
    pub fn blank(title: &str) -> Self {
        Self::new(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n</body>\n</html>\n"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn into_string(self) -> String {
        self.source
    }

    /// Byte range of the anchor element's content.
    fn anchor_range(&self, anchor_id: &str) -> Option<(usize, usize)> {
        let needle = format!("id=\"{anchor_id}\"");
        let mut from = 0;
        while let Some(rel) = self.source[from..].find("<script") {
            let tag_start = from + rel;
            let tag_end = tag_start + self.source[tag_start..].find('>')?;
            let tag = &self.source[tag_start..tag_end];
            let has_id = tag
                .match_indices(&needle)
                .any(|(at, _)| tag[..at].ends_with(|c: char| c.is_ascii_whitespace()));
            if has_id {
                let content_start = tag_end + 1;
                let content_end = content_start + self.source[content_start..].find("</script")?;
                return Some((content_start, content_end));
            }
            from = tag_end;
        }
        None
    }
}

impl HostDocument for HtmlDocument {
    fn anchor_text(&self, anchor_id: &str) -> Option<String> {
        let (start, end) = self.anchor_range(anchor_id)?;
        Some(self.source[start..end].to_string())
    }

    fn set_anchor_text(&mut self, anchor_id: &str, text: &str) {
        if let Some((start, end)) = self.anchor_range(anchor_id) {
            self.source.replace_range(start..end, text);
            return;
        }
        let element =
            format!("<script id=\"{anchor_id}\" type=\"application/json\">{text}</script>\n");
        match self.source.rfind("</body>") {
            Some(at) => self.source.insert_str(at, &element),
            None => self.source.push_str(&element),
        }
    }
}

/// Write `bundle` into the document's bundle anchor, replacing any prior save.
pub fn embed_in_document<T: Serialize>(
    doc: &mut impl HostDocument,
    bundle: &Bundle<T>,
) -> Result<(), BundleError> {
    // `<` only occurs inside JSON strings, where `\u003c` means the same thing.
    let json = bundle.to_json()?.replace('<', "\\u003c");
    tracing::debug!(bytes = json.len(), "embedding bundle in document");
    doc.set_anchor_text(BUNDLE_ANCHOR_ID, &json);
    Ok(())
}

/// Read the embedded bundle, if there is one.
pub fn extract_from_document<T: DeserializeOwned>(
    doc: &impl HostDocument,
) -> Result<Option<Bundle<T>>, BundleError> {
    match doc.anchor_text(BUNDLE_ANCHOR_ID) {
        Some(text) if !text.trim().is_empty() => Ok(Some(Bundle::from_json(text.trim())?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flicksy_resources::{EncodedResource, ResourceId};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn bundle(project: serde_json::Value) -> Bundle<serde_json::Value> {
        let mut resources = BTreeMap::new();
        resources.insert(
            ResourceId(1),
            EncodedResource {
                kind: "rgba-base64".into(),
                data: "1x1;AAAAAA==".into(),
            },
        );
        Bundle { project, resources }
    }

    #[test]
    fn blank_document_has_no_bundle() {
        let doc = HtmlDocument::blank("flicksy");
        let extracted: Option<Bundle<serde_json::Value>> = extract_from_document(&doc).unwrap();
        assert!(extracted.is_none());
    }

    #[test]
    fn embed_then_extract() {
        let mut doc = HtmlDocument::blank("flicksy");
        let original = bundle(json!({ "scenes": [{ "id": 1, "texture": "1" }] }));
        embed_in_document(&mut doc, &original).unwrap();

        let body_close = doc.as_str().find("</body>").unwrap();
        let anchor = doc.as_str().find(BUNDLE_ANCHOR_ID).unwrap();
        assert!(anchor < body_close);

        let extracted = extract_from_document(&doc).unwrap();
        assert_eq!(extracted, Some(original));
    }

    #[test]
    fn embed_replaces_prior_contents() {
        let mut doc = HtmlDocument::blank("flicksy");
        embed_in_document(&mut doc, &bundle(json!({ "v": 1 }))).unwrap();
        embed_in_document(&mut doc, &bundle(json!({ "v": 2 }))).unwrap();

        assert_eq!(doc.as_str().matches(BUNDLE_ANCHOR_ID).count(), 1);
        let extracted: Bundle<serde_json::Value> = extract_from_document(&doc).unwrap().unwrap();
        assert_eq!(extracted.project, json!({ "v": 2 }));
    }

    #[test]
    fn embedded_markup_cannot_close_the_element() {
        let mut doc = HtmlDocument::blank("flicksy");
        let sneaky = bundle(json!({ "title": "</script><script>alert(1)</script>" }));
        embed_in_document(&mut doc, &sneaky).unwrap();

        assert_eq!(doc.as_str().matches("</script").count(), 1);
        let extracted = extract_from_document(&doc).unwrap();
        assert_eq!(extracted, Some(sneaky));
    }

    #[test]
    fn other_script_elements_are_left_alone() {
        let source = concat!(
            "<html><body>",
            "<script data-module-name=\"maker\">const x = 1;</script>",
            "<script id=\"flicksy-bundle\" type=\"application/json\"></script>",
            "</body></html>"
        );
        let mut doc = HtmlDocument::new(source);
        assert_eq!(doc.anchor_text(BUNDLE_ANCHOR_ID).as_deref(), Some(""));
        let extracted: Option<Bundle<serde_json::Value>> = extract_from_document(&doc).unwrap();
        assert!(extracted.is_none());

        embed_in_document(&mut doc, &bundle(json!(null))).unwrap();
        assert!(doc.as_str().contains("const x = 1;"));
        assert!(extract_from_document::<serde_json::Value>(&doc).unwrap().is_some());
    }

    #[test]
    fn data_attributes_are_not_mistaken_for_the_id() {
        let source = concat!(
            "<html><body>",
            "<script data-id=\"flicksy-bundle\">const y = 2;</script>",
            "<script type=\"application/json\"\nid=\"flicksy-bundle\">null</script>",
            "</body></html>"
        );
        let mut doc = HtmlDocument::new(source);
        assert_eq!(doc.anchor_text(BUNDLE_ANCHOR_ID).as_deref(), Some("null"));

        embed_in_document(&mut doc, &bundle(json!({ "v": 3 }))).unwrap();
        assert!(doc.as_str().contains("const y = 2;"));
        let extracted: Bundle<serde_json::Value> = extract_from_document(&doc).unwrap().unwrap();
        assert_eq!(extracted.project, json!({ "v": 3 }));
    }

    #[test]
    fn document_without_body_gets_element_appended() {
        let mut doc = HtmlDocument::new("<p>fragment</p>");
        embed_in_document(&mut doc, &bundle(json!(1))).unwrap();
        assert!(doc.as_str().starts_with("<p>fragment</p><script id=\"flicksy-bundle\""));
    }

    #[test]
    fn garbage_in_anchor_is_corrupt() {
        let doc = HtmlDocument::new(
            "<body><script id=\"flicksy-bundle\" type=\"application/json\">{oops</script></body>",
        );
        let err = extract_from_document::<serde_json::Value>(&doc).unwrap_err();
        assert!(err.is_corrupt());
    }
}
