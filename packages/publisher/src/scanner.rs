//! Locates `<img>` nodes in rich-text content and rewrites their sources.
//!
//! The scanner never re-serializes markup. Nodes are found by byte span and
//! only the `src` value of a rewritten node changes, so every other byte of
//! the document comes back exactly as submitted.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD};
use regex::Regex;
use tracing::warn;

/// Comments (possibly unterminated) and `<img>` tags, honoring quoted attribute values.
static NODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<!--.*?(?:-->|\z)|<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#)
        .expect("image node regex")
});

/// One attribute: a name, optionally followed by a quoted or bare value.
static ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>`]+)))?"#)
        .expect("attribute regex")
});

const IMG_OPEN: &str = "<img";
const DATA_IMAGE_PREFIX: &str = "data:image/";

/// Identifies an `<img>` node by its ordinal position in the document.
///
/// Handles are stable for a given content string, so a handle obtained from
/// [`DocumentScanner::extract_embedded_images`] addresses the same node in
/// [`DocumentScanner::rewrite_references`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// An image embedded in the document as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub handle: NodeHandle,
    /// Decoded payload. Empty when the payload could not be decoded.
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

struct ImageNode<'a> {
    handle: NodeHandle,
    /// Byte range of the `src` value, excluding quotes.
    start: usize,
    end: usize,
    quoted: bool,
    value: &'a str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentScanner;

impl DocumentScanner {
    pub fn new() -> Self {
        Self
    }

    /// Return every image whose source is an inline `data:image/...` URI.
    ///
    /// External URLs and images without a source are not returned.
    pub fn extract_embedded_images(&self, content: &str) -> Vec<EmbeddedImage> {
        image_nodes(content)
            .into_iter()
            .filter_map(|node| {
                let (mime_type, payload) = split_data_uri(node.value)?;
                let bytes = decode_payload(node.handle, payload);
                Some(EmbeddedImage {
                    handle: node.handle,
                    bytes,
                    mime_type: mime_type.to_string(),
                })
            })
            .collect()
    }

    /// Non-inline `src` values, in document order.
    pub fn referenced_sources(&self, content: &str) -> Vec<String> {
        image_nodes(content)
            .into_iter()
            .map(|node| node.value.trim())
            .filter(|value| !value.is_empty() && !is_data_image(value))
            .map(str::to_string)
            .collect()
    }

    /// Replace the `src` of each mapped node with its final name.
    ///
    /// An empty name blanks the source. Unmapped nodes are left untouched.
    pub fn rewrite_references(
        &self,
        content: &str,
        mapping: &HashMap<NodeHandle, String>,
    ) -> String {
        if mapping.is_empty() {
            return content.to_string();
        }

        let mut out = String::with_capacity(content.len());
        let mut cursor = 0;
        for node in image_nodes(content) {
            let Some(name) = mapping.get(&node.handle) else {
                continue;
            };
            out.push_str(&content[cursor..node.start]);
            let escaped = escape_attribute(name);
            if node.quoted {
                out.push_str(&escaped);
            } else {
                out.push('"');
                out.push_str(&escaped);
                out.push('"');
            }
            cursor = node.end;
        }
        out.push_str(&content[cursor..]);
        out
    }
}

fn image_nodes(content: &str) -> Vec<ImageNode<'_>> {
    let mut nodes = Vec::new();
    let mut ordinal = 0;

    for m in NODE_REGEX.find_iter(content) {
        let tag = m.as_str();
        if tag.starts_with("<!--") {
            continue;
        }
        let handle = NodeHandle(ordinal);
        ordinal += 1;

        let Some((span, quoted)) = src_span(tag) else {
            continue;
        };

        nodes.push(ImageNode {
            handle,
            start: m.start() + span.start,
            end: m.start() + span.end,
            quoted,
            value: &tag[span],
        });
    }
    nodes
}

/// Byte range within `tag` of the first attribute named `src`, and whether
/// its value is quoted. Attributes are walked in order, so text inside other
/// attribute values is never mistaken for a source.
fn src_span(tag: &str) -> Option<(Range<usize>, bool)> {
    let attrs = tag.get(IMG_OPEN.len()..tag.len() - 1)?;
    let caps = ATTR_REGEX
        .captures_iter(attrs)
        .find(|caps| caps[1].eq_ignore_ascii_case("src"))?;
    let (value, quoted) = match (caps.get(2), caps.get(3), caps.get(4)) {
        (Some(v), _, _) | (_, Some(v), _) => (v, true),
        (_, _, Some(v)) => (v, false),
        _ => return None,
    };
    let range = value.range();
    Some((
        range.start + IMG_OPEN.len()..range.end + IMG_OPEN.len(),
        quoted,
    ))
}

fn is_data_image(value: &str) -> bool {
    value
        .get(..DATA_IMAGE_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(DATA_IMAGE_PREFIX))
}

/// Split `data:image/png;base64,AAAA` into (`image/png`, `AAAA`).
///
/// Returns `None` for anything that is not an inline image. A URI that is an
/// image but not base64-encoded yields an empty payload.
fn split_data_uri(value: &str) -> Option<(&str, &str)> {
    let value = value.trim();
    if !is_data_image(value) {
        return None;
    }
    let rest = &value["data:".len()..];
    let (meta, payload) = rest.split_once(',').unwrap_or((rest, ""));
    let mut params = meta.split(';');
    let mime_type = params.next().unwrap_or_default();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Some((mime_type, ""));
    }
    Some((mime_type, payload))
}

fn decode_payload(handle: NodeHandle, payload: &str) -> Vec<u8> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        warn!(node = handle.index(), "Inline image has no base64 payload");
        return Vec::new();
    }
    match STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(node = handle.index(), error = %e, "Inline image payload is not valid base64");
            Vec::new()
        }
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
