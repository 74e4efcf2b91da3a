//! Reader and writer for well-formed markup.
//!
//! The reader is deliberately small: it understands XHTML-style input with
//! explicit end tags (void elements excepted) and does not run the HTML5 tree
//! construction rules. Stray end tags are dropped and unclosed elements are
//! closed at end of input.

use anyhow::{Context, Result};
use regex::{Captures, Regex};

use super::{Document, NodeId, NodeKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub struct MarkupReader {
    doctype: Regex,
    processing_instruction: Regex,
    start_tag: Regex,
    end_tag: Regex,
    attribute: Regex,
    reference: Regex,
}

impl MarkupReader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            doctype: Regex::new(
                r#"(?is)^<!DOCTYPE\s+[^\s>]+(?:\s+PUBLIC\s+(?:"([^"]*)"|'([^']*)'))?[^>]*>"#,
            )
            .context("failed to compile doctype regex")?,
            processing_instruction: Regex::new(r"(?s)^<\?.*?\?>")
                .context("failed to compile processing instruction regex")?,
            start_tag: Regex::new(
                r#"^<([A-Za-z][A-Za-z0-9:_.-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
            )
            .context("failed to compile start tag regex")?,
            end_tag: Regex::new(r"^</([A-Za-z][A-Za-z0-9:_.-]*)\s*>")
                .context("failed to compile end tag regex")?,
            attribute: Regex::new(
                r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
            )
            .context("failed to compile attribute regex")?,
            reference: Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z]+);")
                .context("failed to compile character reference regex")?,
        })
    }

    pub fn parse(&self, input: &str) -> Document {
        let mut doc = Document::new();
        let mut open = vec![doc.root()];
        let mut pos = 0;

        while pos < input.len() {
            let current = *open.last().unwrap_or(&doc.root());
            let Some(offset) = input[pos..].find('<') else {
                self.push_text(&mut doc, current, &input[pos..]);
                break;
            };
            if offset > 0 {
                self.push_text(&mut doc, current, &input[pos..pos + offset]);
            }
            pos += offset;
            let rest = &input[pos..];

            if let Some(body) = rest.strip_prefix("<!--") {
                let (comment, consumed) = match body.find("-->") {
                    Some(end) => (&body[..end], end + 7),
                    None => (body, rest.len()),
                };
                let node = doc.create_comment(comment);
                doc.append_child(current, node);
                pos += consumed;
            } else if let Some(captures) = self.doctype.captures(rest) {
                let public_id = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map(|value| value.as_str().to_string());
                doc.set_doctype_public_id(public_id);
                doc.push_prolog(captures[0].to_string());
                pos += captures[0].len();
            } else if let Some(found) = self.processing_instruction.find(rest) {
                doc.push_prolog(found.as_str().to_string());
                pos += found.end();
            } else if let Some(captures) = self.end_tag.captures(rest) {
                let name = captures[1].to_ascii_lowercase();
                if let Some(index) = open.iter().rposition(|node| doc.name(*node) == name)
                    && index > 0
                {
                    open.truncate(index);
                }
                pos += captures[0].len();
            } else if let Some(captures) = self.start_tag.captures(rest) {
                pos += captures[0].len();
                let name = captures[1].to_ascii_lowercase();
                let element = doc.create_element(&name);
                self.apply_attributes(&mut doc, element, &captures);
                doc.append_child(current, element);

                let self_closing = !captures[3].is_empty();
                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !self_closing {
                    let body = &input[pos..];
                    let close = find_ascii_case_insensitive(body, &format!("</{name}"));
                    let end = close.unwrap_or(body.len());
                    if end > 0 {
                        doc.set_text(element, Some(body[..end].to_string()));
                    }
                    pos += end;
                    if let Some(captures) = close.and_then(|_| self.end_tag.captures(&input[pos..])) {
                        pos += captures[0].len();
                    }
                } else if !self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
                    open.push(element);
                }
            } else {
                self.push_text(&mut doc, current, "<");
                pos += 1;
            }
        }

        doc
    }

    fn apply_attributes(&self, doc: &mut Document, element: NodeId, captures: &Captures<'_>) {
        let Some(raw) = captures.get(2) else {
            return;
        };
        for attribute in self.attribute.captures_iter(raw.as_str()) {
            let name = attribute[1].to_ascii_lowercase();
            let value = attribute
                .get(2)
                .or_else(|| attribute.get(3))
                .or_else(|| attribute.get(4))
                .map(|value| self.decode(value.as_str()))
                .unwrap_or_default();
            if doc.attr(element, &name).is_none() {
                doc.set_attr(element, &name, &value);
            }
        }
    }

    fn push_text(&self, doc: &mut Document, parent: NodeId, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = self.decode(raw);
        doc.append_text(parent, &decoded);
    }

    fn decode(&self, raw: &str) -> String {
        if !raw.contains('&') {
            return raw.to_string();
        }
        self.reference
            .replace_all(raw, |captures: &Captures<'_>| {
                decode_reference(&captures[1]).unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }
}

/// One-shot parse; callers reading many files should keep a [`MarkupReader`].
#[cfg(test)]
pub fn parse(input: &str) -> Result<Document> {
    Ok(MarkupReader::new()?.parse(input))
}

fn decode_reference(reference: &str) -> Option<String> {
    if let Some(numeric) = reference.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let named = match reference {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => return None,
    };
    Some(named.to_string())
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for raw in doc.prolog() {
        out.push_str(raw);
    }
    let root = doc.root();
    if let Some(text) = doc.text(root) {
        escape_text(text, &mut out);
    }
    for child in doc.children(root) {
        write_node(doc, *child, &mut out);
    }
    out
}

/// Serializes a single node and its subtree, without its tail.
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_open_content_close(doc, id, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    write_open_content_close(doc, id, out);
    if let Some(tail) = doc.tail(id) {
        escape_text(tail, out);
    }
}

fn write_open_content_close(doc: &Document, id: NodeId, out: &mut String) {
    let node = doc.node(id);
    if node.kind() == NodeKind::Comment {
        out.push_str("<!--");
        out.push_str(doc.text(id).unwrap_or_default());
        out.push_str("-->");
        return;
    }

    let name = doc.name(id);
    out.push('<');
    out.push_str(name);
    for (key, value) in node.attributes() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attribute(value, out);
        out.push('"');
    }
    out.push('>');

    let children = doc.children(id);
    if VOID_ELEMENTS.contains(&name) && children.is_empty() && doc.text(id).is_none() {
        return;
    }

    if let Some(text) = doc.text(id) {
        if RAW_TEXT_ELEMENTS.contains(&name) {
            out.push_str(text);
        } else {
            escape_text(text, out);
        }
    }
    for child in children {
        write_node(doc, *child, out);
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
